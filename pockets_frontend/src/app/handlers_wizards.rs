use tracing::debug;

use crate::error::{user_message, ClaimError};
use crate::models::{CreateEventInput, CreatePocketInput};

use super::state::{CreateEventWizard, CreatePocketWizard, EventWizardStep, PocketWizardStep};
use super::tasks;
use super::PocketsApp;

fn required_name(name: &str, what: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        Err(format!("{what} name cannot be empty"))
    } else {
        Ok(name.to_string())
    }
}

fn optional_text(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Photos may be skipped, but a started selection must be fully uploaded.
fn photos_ready(wizard: &CreateEventWizard) -> Result<(), ClaimError> {
    let pending = wizard.uploads.tracker.pending_count();
    if pending > 0 {
        Err(ClaimError::UploadsPending { pending })
    } else {
        Ok(())
    }
}

impl PocketsApp {
    pub fn open_pocket_wizard(&mut self) {
        self.create_pocket = Some(CreatePocketWizard::default());
    }

    pub fn close_pocket_wizard(&mut self) {
        self.create_pocket = None;
    }

    pub fn toggle_pocket_member(&mut self, user_id: &str) {
        if let Some(wizard) = self.create_pocket.as_mut() {
            if !wizard.member_ids.remove(user_id) {
                wizard.member_ids.insert(user_id.to_string());
            }
        }
    }

    pub fn pocket_wizard_next(&mut self) {
        let Some(wizard) = self.create_pocket.as_mut() else {
            return;
        };
        wizard.error = None;
        wizard.step = match wizard.step {
            PocketWizardStep::Details => match required_name(&wizard.name, "Pocket") {
                Ok(_) => PocketWizardStep::Members,
                Err(message) => {
                    wizard.error = Some(message);
                    PocketWizardStep::Details
                }
            },
            PocketWizardStep::Members | PocketWizardStep::Review => PocketWizardStep::Review,
        };
    }

    pub fn pocket_wizard_back(&mut self) {
        if let Some(wizard) = self.create_pocket.as_mut() {
            wizard.error = None;
            wizard.step = match wizard.step {
                PocketWizardStep::Review => PocketWizardStep::Members,
                PocketWizardStep::Members | PocketWizardStep::Details => PocketWizardStep::Details,
            };
        }
    }

    pub fn submit_pocket_wizard(&mut self) {
        let Some(wizard) = self.create_pocket.as_mut() else {
            return;
        };
        if wizard.submitting {
            return;
        }
        let name = match required_name(&wizard.name, "Pocket") {
            Ok(name) => name,
            Err(message) => {
                wizard.error = Some(message);
                wizard.step = PocketWizardStep::Details;
                return;
            }
        };
        let input = CreatePocketInput {
            name,
            description: optional_text(&wizard.description),
            member_ids: wizard.member_ids.iter().cloned().collect(),
        };
        wizard.submitting = true;
        wizard.error = None;
        tasks::create_pocket(&self.runtime, self.backend.clone(), self.tx.clone(), input);
    }

    pub fn open_event_wizard(&mut self, pocket_id: &str) {
        self.create_event = Some(CreateEventWizard::new(
            pocket_id.to_string(),
            self.previews.clone(),
        ));
    }

    /// Abandons the wizard along with any uploads it started.
    pub fn close_event_wizard(&mut self) {
        self.create_event = None;
    }

    pub fn toggle_event_member(&mut self, user_id: &str) {
        if let Some(wizard) = self.create_event.as_mut() {
            if !wizard.member_ids.remove(user_id) {
                wizard.member_ids.insert(user_id.to_string());
            }
        }
    }

    pub fn event_wizard_next(&mut self) {
        let Some(wizard) = self.create_event.as_mut() else {
            return;
        };
        wizard.error = None;
        wizard.step = match wizard.step {
            EventWizardStep::Details => match required_name(&wizard.name, "Event") {
                Ok(_) => EventWizardStep::Members,
                Err(message) => {
                    wizard.error = Some(message);
                    EventWizardStep::Details
                }
            },
            EventWizardStep::Members => EventWizardStep::Photos,
            EventWizardStep::Photos => match photos_ready(wizard) {
                Ok(()) => EventWizardStep::Review,
                Err(err) => {
                    wizard.error = Some(user_message(&err));
                    EventWizardStep::Photos
                }
            },
            EventWizardStep::Review => EventWizardStep::Review,
        };
    }

    pub fn event_wizard_back(&mut self) {
        if let Some(wizard) = self.create_event.as_mut() {
            wizard.error = None;
            wizard.step = match wizard.step {
                EventWizardStep::Review => EventWizardStep::Photos,
                EventWizardStep::Photos => EventWizardStep::Members,
                EventWizardStep::Members | EventWizardStep::Details => EventWizardStep::Details,
            };
        }
    }

    /// Creates the event, then claims the wizard's photos into it. If the
    /// event already exists from an earlier attempt only the claim is redone.
    pub fn submit_event_wizard(&mut self) {
        let Some(wizard) = self.create_event.as_mut() else {
            return;
        };
        if wizard.submitting {
            return;
        }
        if let Err(err) = photos_ready(wizard) {
            wizard.error = Some(user_message(&err));
            wizard.step = EventWizardStep::Photos;
            return;
        }
        let session = wizard.uploads.id;
        if let Some(event) = &wizard.created {
            if wizard.uploads.tracker.is_empty() {
                let name = event.name.clone();
                debug!(%session, "event exists and no photos remain");
                self.finish_event_wizard(&name);
                return;
            }
            debug!(%session, "event exists, retrying the claim only");
            wizard.submitting = true;
            wizard.error = None;
            self.spawn_claim(session);
            return;
        }
        let name = match required_name(&wizard.name, "Event") {
            Ok(name) => name,
            Err(message) => {
                wizard.error = Some(message);
                wizard.step = EventWizardStep::Details;
                return;
            }
        };
        let input = CreateEventInput {
            pocket_id: wizard.pocket_id.clone(),
            name,
            date: wizard.date,
            member_ids: wizard.member_ids.iter().cloned().collect(),
        };
        wizard.submitting = true;
        wizard.error = None;
        tasks::create_event(
            &self.runtime,
            self.backend.clone(),
            self.tx.clone(),
            session,
            input,
        );
    }
}
