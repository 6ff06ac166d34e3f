use std::io::Cursor;
use std::time::Duration;

use bytes::Bytes;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DurationState {
    Loading,
    Known(Duration),
    /// Shown as an indeterminate length.
    Unknown,
}

/// Reads the duration from container metadata, or decodes the whole stream
/// and counts samples when the container does not say.
pub fn probe_duration(bytes: &[u8]) -> Option<Duration> {
    let decoder = match Decoder::new(Cursor::new(bytes.to_vec())) {
        Ok(decoder) => decoder,
        Err(err) => {
            debug!(error = %err, "audio is not decodable");
            return None;
        }
    };
    if let Some(duration) = decoder.total_duration().filter(|d| !d.is_zero()) {
        return Some(duration);
    }

    let rate = decoder.sample_rate() as f64;
    let channels = decoder.channels() as f64;
    let samples = decoder.count() as f64;
    if rate <= 0.0 || channels <= 0.0 || samples <= 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(samples / (rate * channels)))
}

/// Resolves a recording's duration off the async runtime, giving up after
/// `budget`. Always settles to `Known` or `Unknown`.
pub async fn resolve_duration(bytes: Bytes, budget: Duration) -> DurationState {
    resolve_with(move || probe_duration(&bytes), budget).await
}

pub async fn resolve_with<F>(probe: F, budget: Duration) -> DurationState
where
    F: FnOnce() -> Option<Duration> + Send + 'static,
{
    match tokio::time::timeout(budget, tokio::task::spawn_blocking(probe)).await {
        Ok(Ok(Some(duration))) if !duration.is_zero() => DurationState::Known(duration),
        Ok(Ok(_)) => DurationState::Unknown,
        Ok(Err(err)) => {
            warn!(error = %err, "duration probe panicked");
            DurationState::Unknown
        }
        Err(_) => {
            warn!(budget_ms = budget.as_millis() as u64, "duration probe timed out");
            DurationState::Unknown
        }
    }
}

/// Playback of a voice note through the default output device.
pub struct VoiceNotePlayer {
    duration: DurationState,
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    error: Option<String>,
}

impl Default for VoiceNotePlayer {
    fn default() -> Self {
        Self {
            duration: DurationState::Loading,
            output: None,
            sink: None,
            error: None,
        }
    }
}

impl VoiceNotePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(&self) -> DurationState {
        self.duration
    }

    pub fn set_duration(&mut self, duration: DurationState) {
        self.duration = duration;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| !sink.is_paused() && !sink.empty())
    }

    pub fn play(&mut self, bytes: Bytes) {
        self.error = None;
        if let Err(err) = self.start_playback(bytes) {
            warn!(error = %err, "voice note playback failed");
            self.error = Some(err);
        }
    }

    fn start_playback(&mut self, bytes: Bytes) -> Result<(), String> {
        if self.output.is_none() {
            let output = OutputStream::try_default().map_err(|err| format!("No audio output: {err}"))?;
            self.output = Some(output);
        }
        let Some((_, handle)) = &self.output else {
            return Err("No audio output".into());
        };
        let source = Decoder::new(Cursor::new(bytes.to_vec()))
            .map_err(|err| format!("Could not decode recording: {err}"))?;
        let sink = Sink::try_new(handle).map_err(|err| format!("Could not start playback: {err}"))?;
        sink.append(source);
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }

    pub fn toggle_pause(&mut self) {
        if let Some(sink) = &self.sink {
            if sink.is_paused() {
                sink.play();
            } else {
                sink.pause();
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

#[cfg(test)]
pub(crate) fn wav_bytes(sample_rate: u32, samples: usize) -> Vec<u8> {
    let data_len = (samples * 2) as u32;
    let mut out = Vec::with_capacity(44 + samples * 2);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..samples {
        let sample = ((i % 64) as i16 - 32) * 256;
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}
