pub mod player;
pub mod recorder;

pub use player::{probe_duration, resolve_duration, DurationState, VoiceNotePlayer};
pub use recorder::{is_playable, RecorderState, VoiceNoteRecorder};
