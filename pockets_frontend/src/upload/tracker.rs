use uuid::Uuid;

use crate::media::{PreviewHandle, PreviewStore, SelectedFile};

/// One selected file and where its upload stands.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub id: Uuid,
    pub file: SelectedFile,
    pub preview: PreviewHandle,
    pub uploading: bool,
    pub upload_progress: u8,
    pub object_key: Option<String>,
    pub upload_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading(u8),
    Uploaded(String),
    Failed(String),
}

impl UploadFile {
    pub fn status(&self) -> UploadStatus {
        if self.uploading {
            return UploadStatus::Uploading(self.upload_progress);
        }
        if let Some(key) = &self.object_key {
            return UploadStatus::Uploaded(key.clone());
        }
        match &self.upload_error {
            Some(err) => UploadStatus::Failed(err.clone()),
            None => UploadStatus::Pending,
        }
    }

    pub fn is_keyed(&self) -> bool {
        !self.uploading && self.object_key.as_deref().is_some_and(|key| !key.is_empty())
    }
}

/// Progress reports folded into a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Started,
    Progress(u8),
    Finished(Result<String, String>),
}

/// The files selected in one upload session (a modal or wizard step).
pub struct UploadTracker {
    files: Vec<UploadFile>,
    previews: PreviewStore,
}

impl UploadTracker {
    pub fn new(previews: PreviewStore) -> Self {
        Self {
            files: Vec::new(),
            previews,
        }
    }

    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    pub fn get(&self, id: Uuid) -> Option<&UploadFile> {
        self.files.iter().find(|file| file.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Appends files and returns the new entries' ids paired with their data,
    /// ready to hand to the orchestrator.
    pub fn add_files(&mut self, selected: Vec<SelectedFile>) -> Vec<(Uuid, SelectedFile)> {
        let mut added = Vec::with_capacity(selected.len());
        for file in selected {
            let id = Uuid::new_v4();
            let preview = self.previews.create_for(&file);
            added.push((id, file.clone()));
            self.files.push(UploadFile {
                id,
                file,
                preview,
                uploading: false,
                upload_progress: 0,
                object_key: None,
                upload_error: None,
            });
        }
        added
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let Some(index) = self.files.iter().position(|file| file.id == id) else {
            return false;
        };
        let removed = self.files.remove(index);
        self.previews.release(removed.preview);
        true
    }

    /// Partial update of a single entry. Unknown ids (already removed files)
    /// are ignored.
    pub fn update(&mut self, id: Uuid, patch: impl FnOnce(&mut UploadFile)) -> bool {
        match self.files.iter_mut().find(|file| file.id == id) {
            Some(file) => {
                patch(file);
                true
            }
            None => false,
        }
    }

    pub fn apply(&mut self, id: Uuid, event: UploadEvent) -> bool {
        self.update(id, |file| match event {
            UploadEvent::Started => {
                file.uploading = true;
                file.upload_progress = 0;
                file.object_key = None;
                file.upload_error = None;
            }
            UploadEvent::Progress(pct) => {
                if file.uploading {
                    file.upload_progress = file.upload_progress.max(pct.min(100));
                }
            }
            UploadEvent::Finished(Ok(key)) => {
                file.uploading = false;
                file.upload_progress = 100;
                file.object_key = Some(key);
                file.upload_error = None;
            }
            UploadEvent::Finished(Err(message)) => {
                file.uploading = false;
                file.object_key = None;
                file.upload_error = Some(message);
            }
        })
    }

    pub fn any_uploading(&self) -> bool {
        self.files.iter().any(|file| file.uploading)
    }

    /// Files that still block submission.
    pub fn pending_count(&self) -> usize {
        self.files.iter().filter(|file| !file.is_keyed()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &UploadFile> {
        self.files
            .iter()
            .filter(|file| !file.uploading && file.upload_error.is_some())
    }

    pub fn all_keyed(&self) -> bool {
        self.files.iter().all(UploadFile::is_keyed)
    }

    /// Whether the claim action may be offered at all.
    pub fn can_submit(&self) -> bool {
        !self.files.is_empty() && self.all_keyed()
    }

    /// Drops every file and releases its preview.
    pub fn clear(&mut self) {
        for file in self.files.drain(..) {
            self.previews.release(file.preview);
        }
    }
}

impl Drop for UploadTracker {
    fn drop(&mut self) {
        self.clear();
    }
}
