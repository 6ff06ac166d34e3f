use bytes::{Bytes, BytesMut};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RecorderError;
use crate::media::{PreviewHandle, PreviewStore, SelectedFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Previewing,
    Uploading,
    Ready,
}

impl RecorderState {
    fn name(self) -> &'static str {
        match self {
            RecorderState::Idle => "idle",
            RecorderState::Recording => "recording",
            RecorderState::Previewing => "previewing",
            RecorderState::Uploading => "uploading",
            RecorderState::Ready => "ready",
        }
    }
}

/// Voice-note capture: collects encoded chunks from the capture device,
/// joins them on stop and drives the preview and upload steps.
pub struct VoiceNoteRecorder {
    state: RecorderState,
    mime: String,
    chunks: Vec<Bytes>,
    recording: Option<Bytes>,
    preview: Option<PreviewHandle>,
    object_key: Option<String>,
    error: Option<String>,
    armed: bool,
    previews: PreviewStore,
}

impl VoiceNoteRecorder {
    pub fn new(previews: PreviewStore) -> Self {
        Self {
            state: RecorderState::Idle,
            mime: "audio/wav".to_string(),
            chunks: Vec::new(),
            recording: None,
            preview: None,
            object_key: None,
            error: None,
            armed: false,
            previews,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn preview(&self) -> Option<PreviewHandle> {
        self.preview
    }

    pub fn recording(&self) -> Option<&Bytes> {
        self.recording.as_ref()
    }

    pub fn object_key(&self) -> Option<&str> {
        self.object_key.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True right after a re-record, when the UI should offer to start again
    /// immediately.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn require(&self, allowed: &[RecorderState], action: &'static str) -> Result<(), RecorderError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(RecorderError::InvalidTransition {
                action,
                state: self.state.name(),
            })
        }
    }

    /// Starts a capture in `mime`, which must be a format the player can
    /// decode: WAV, FLAC or Ogg Vorbis.
    pub fn start(&mut self, mime: &str) -> Result<(), RecorderError> {
        self.require(&[RecorderState::Idle], "start recording")?;
        if !is_playable(mime) {
            return Err(RecorderError::UnsupportedFormat(mime.to_string()));
        }
        self.mime = mime.to_string();
        self.chunks.clear();
        self.error = None;
        self.armed = false;
        self.state = RecorderState::Recording;
        debug!(mime, "voice note recording started");
        Ok(())
    }

    pub fn push_chunk(&mut self, chunk: Bytes) -> Result<(), RecorderError> {
        self.require(&[RecorderState::Recording], "record audio")?;
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
        Ok(())
    }

    /// Joins the captured chunks into one playable unit and creates its
    /// preview. An empty capture drops back to idle.
    pub fn stop(&mut self) -> Result<PreviewHandle, RecorderError> {
        self.require(&[RecorderState::Recording], "stop recording")?;
        let total: usize = self.chunks.iter().map(Bytes::len).sum();
        if total == 0 {
            self.state = RecorderState::Idle;
            return Err(RecorderError::EmptyRecording);
        }
        let mut joined = BytesMut::with_capacity(total);
        for chunk in self.chunks.drain(..) {
            joined.extend_from_slice(&chunk);
        }
        let joined = joined.freeze();
        let preview = self.previews.create_audio(joined.clone());
        self.recording = Some(joined);
        self.preview = Some(preview);
        self.state = RecorderState::Previewing;
        info!(bytes = total, "voice note captured");
        Ok(preview)
    }

    /// Throws the take away and returns to idle, ready to record again.
    pub fn rerecord(&mut self) -> Result<(), RecorderError> {
        self.require(&[RecorderState::Previewing], "re-record")?;
        self.discard();
        self.armed = true;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), RecorderError> {
        if self.state == RecorderState::Uploading {
            return Err(RecorderError::InvalidTransition {
                action: "cancel",
                state: self.state.name(),
            });
        }
        self.discard();
        Ok(())
    }

    /// Hands out the recording as an uploadable file.
    pub fn begin_upload(&mut self) -> Result<SelectedFile, RecorderError> {
        self.require(&[RecorderState::Previewing], "post")?;
        let Some(recording) = self.recording.clone() else {
            return Err(RecorderError::EmptyRecording);
        };
        self.error = None;
        self.state = RecorderState::Uploading;
        let name = format!("voice-note-{}.{}", Uuid::new_v4(), extension_for(&self.mime));
        let mut file = SelectedFile::from_bytes(name, recording);
        file.info.mime = self.mime.clone();
        file.info.kind = crate::models::MediaKind::Audio;
        Ok(file)
    }

    pub fn finish_upload(&mut self, object_key: String) -> Result<(), RecorderError> {
        self.require(&[RecorderState::Uploading], "finish upload")?;
        self.object_key = Some(object_key);
        self.state = RecorderState::Ready;
        Ok(())
    }

    /// Upload failed: back to previewing so the user can retry or re-record.
    pub fn fail_upload(&mut self, message: String) -> Result<(), RecorderError> {
        self.require(&[RecorderState::Uploading], "fail upload")?;
        self.error = Some(message);
        self.state = RecorderState::Previewing;
        Ok(())
    }

    fn discard(&mut self) {
        if let Some(preview) = self.preview.take() {
            self.previews.release(preview);
        }
        self.chunks.clear();
        self.recording = None;
        self.object_key = None;
        self.error = None;
        self.armed = false;
        self.state = RecorderState::Idle;
    }
}

impl Drop for VoiceNoteRecorder {
    fn drop(&mut self) {
        if let Some(preview) = self.preview.take() {
            self.previews.release(preview);
        }
    }
}

fn base_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// Capture formats the rodio build can decode. Ogg only with Vorbis inside.
pub fn is_playable(mime: &str) -> bool {
    match base_mime(mime).as_str() {
        "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/flac" | "audio/x-flac" => true,
        "audio/ogg" => !mime.to_ascii_lowercase().contains("opus"),
        _ => false,
    }
}

fn extension_for(mime: &str) -> &'static str {
    match base_mime(mime).as_str() {
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_of(parts: &[&[u8]]) -> (VoiceNoteRecorder, PreviewStore) {
        let previews = PreviewStore::new();
        let mut recorder = VoiceNoteRecorder::new(previews.clone());
        recorder.start("audio/ogg;codecs=vorbis").unwrap();
        for part in parts {
            recorder.push_chunk(Bytes::copy_from_slice(part)).unwrap();
        }
        (recorder, previews)
    }

    #[test]
    fn stop_concatenates_chunks_in_order() {
        let (mut recorder, previews) = recording_of(&[b"ab", b"", b"cd", b"e"]);
        recorder.stop().unwrap();
        assert_eq!(recorder.state(), RecorderState::Previewing);
        assert_eq!(recorder.recording().unwrap().as_ref(), b"abcde");
        assert_eq!(previews.live_count(), 1);
    }

    #[test]
    fn empty_capture_returns_to_idle() {
        let (mut recorder, _) = recording_of(&[]);
        assert_eq!(recorder.stop(), Err(RecorderError::EmptyRecording));
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn rerecord_discards_and_arms() {
        let (mut recorder, previews) = recording_of(&[b"take one"]);
        recorder.stop().unwrap();
        recorder.rerecord().unwrap();
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert!(recorder.is_armed());
        assert!(recorder.recording().is_none());
        assert_eq!(previews.live_count(), 0);
        recorder.start("audio/wav").unwrap();
        assert!(!recorder.is_armed());
    }

    #[test]
    fn upload_path_reaches_ready() {
        let (mut recorder, _) = recording_of(&[b"voice"]);
        recorder.stop().unwrap();
        let file = recorder.begin_upload().unwrap();
        assert!(file.name.starts_with("voice-note-") && file.name.ends_with(".ogg"));
        assert_eq!(file.info.mime, "audio/ogg;codecs=vorbis");
        assert_eq!(recorder.state(), RecorderState::Uploading);

        assert!(recorder.cancel().is_err());
        recorder.finish_upload("objects/voice".into()).unwrap();
        assert_eq!(recorder.state(), RecorderState::Ready);
        assert_eq!(recorder.object_key(), Some("objects/voice"));
    }

    #[test]
    fn failed_upload_goes_back_to_preview() {
        let (mut recorder, _) = recording_of(&[b"voice"]);
        recorder.stop().unwrap();
        recorder.begin_upload().unwrap();
        recorder.fail_upload("upload failed".into()).unwrap();
        assert_eq!(recorder.state(), RecorderState::Previewing);
        assert_eq!(recorder.error(), Some("upload failed"));
        assert!(recorder.begin_upload().is_ok());
    }

    #[test]
    fn cancel_from_any_non_uploading_state() {
        let (mut recorder, previews) = recording_of(&[b"x"]);
        recorder.cancel().unwrap();
        assert_eq!(recorder.state(), RecorderState::Idle);

        let (mut recorder, _) = recording_of(&[b"x"]);
        recorder.stop().unwrap();
        recorder.begin_upload().unwrap();
        recorder.finish_upload("k".into()).unwrap();
        recorder.cancel().unwrap();
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn formats_the_player_cannot_decode_are_refused() {
        let mut recorder = VoiceNoteRecorder::new(PreviewStore::new());
        for mime in ["audio/webm;codecs=opus", "audio/ogg; codecs=opus", "audio/mp4"] {
            assert_eq!(
                recorder.start(mime),
                Err(RecorderError::UnsupportedFormat(mime.to_string()))
            );
            assert_eq!(recorder.state(), RecorderState::Idle);
        }
        recorder.start("audio/flac").unwrap();
        assert_eq!(recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn invalid_transitions_are_reported() {
        let previews = PreviewStore::new();
        let mut recorder = VoiceNoteRecorder::new(previews);
        assert!(matches!(
            recorder.stop(),
            Err(RecorderError::InvalidTransition { state: "idle", .. })
        ));
        assert!(recorder.push_chunk(Bytes::from_static(b"x")).is_err());
        assert!(recorder.begin_upload().is_err());
    }
}
