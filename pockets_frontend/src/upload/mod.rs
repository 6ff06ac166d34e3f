//! Upload-then-claim pipeline: files go straight to object storage as soon as
//! they are picked, and only a fully keyed selection is attached to an event.

pub mod claim;
pub mod orchestrator;
pub mod tracker;
pub mod uploader;

pub use claim::{complete_claim, submit_claim, ClaimCallback, ClaimRequest};
pub use orchestrator::spawn_uploads;
pub use tracker::{UploadEvent, UploadFile, UploadStatus, UploadTracker};
pub use uploader::upload_object;
