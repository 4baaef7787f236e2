//! WizardRunner – loads a session, applies exactly **one** user action, and
//! persists the updated session back to storage.
//!
//! This is the entry point for services that handle one wizard event per
//! request. Only one action per session runs at a time: a second action
//! arriving while the first is still saving fails with
//! [`WizardError::Busy`], the same way a UI disables its submit button
//! while a request is in flight. Different sessions never wait on each other.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{FormError, Result, WizardError},
    form::{FormData, FormState},
    storage::{SessionStorage, WizardSession},
    wizard::{Transition, WizardController},
};

/// A single user event on a wizard session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "step", rename_all = "snake_case")]
pub enum WizardAction {
    Next,
    Previous,
    JumpTo(usize),
    Finish,
    Close,
}

/// Outcome of [`WizardRunner::run`]: what happened and the session after it.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub transition: Transition,
    pub session: WizardSession,
}

/// Removes the in-flight marker for a session when dropped.
struct InFlight {
    sessions: Arc<DashMap<String, ()>>,
    id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
    }
}

/// High-level helper for the _load → act → save_ pattern.
#[derive(Clone)]
pub struct WizardRunner {
    controller: Arc<WizardController>,
    storage: Arc<dyn SessionStorage>,
    in_flight: Arc<DashMap<String, ()>>,
}

impl WizardRunner {
    pub fn new(controller: Arc<WizardController>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            controller,
            storage,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn controller(&self) -> &Arc<WizardController> {
        &self.controller
    }

    fn claim(&self, session_id: &str) -> Result<InFlight> {
        use dashmap::mapref::entry::Entry;

        match self.in_flight.entry(session_id.to_string()) {
            Entry::Occupied(_) => Err(WizardError::Busy(session_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlight {
                    sessions: self.in_flight.clone(),
                    id: session_id.to_string(),
                })
            }
        }
    }

    async fn load(&self, session_id: &str) -> Result<WizardSession> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| WizardError::SessionNotFound(session_id.to_string()))
    }

    /// Open a new wizard session, optionally pre-filled.
    pub async fn start(&self, form: Option<FormData>) -> Result<WizardSession> {
        let session = WizardSession::with_form(Uuid::new_v4().to_string(), form.unwrap_or_default());
        self.storage.save(session.clone()).await?;
        info!(session_id = %session.id, "Wizard session opened");
        Ok(session)
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<WizardSession> {
        self.load(session_id).await
    }

    /// Apply a form edit to an open session and save it.
    pub async fn edit<F>(&self, session_id: &str, edit: F) -> Result<WizardSession>
    where
        F: FnOnce(&mut FormState) -> std::result::Result<(), FormError> + Send,
    {
        let _guard = self.claim(session_id)?;
        let mut session = self.load(session_id).await?;
        if !session.is_open() {
            return Err(WizardError::InvalidTransition {
                action: "edit",
                step: session.current_step,
            });
        }

        edit(&mut session.form)?;
        self.storage.save(session.clone()).await?;
        Ok(session)
    }

    /// Apply exactly one action and persist the session.
    ///
    /// Finishing or closing ends the session and removes it from storage.
    /// The booking it saved stays in the booking store either way.
    pub async fn run(&self, session_id: &str, action: WizardAction) -> Result<StepResult> {
        let _guard = self.claim(session_id)?;
        let mut session = self.load(session_id).await?;

        let transition = match action {
            WizardAction::Next => self.controller.next(&mut session).await?,
            WizardAction::Previous => self.controller.previous(&mut session)?,
            WizardAction::JumpTo(step) => self.controller.jump_to(&mut session, step)?,
            WizardAction::Finish => self.controller.finish(&mut session).await?,
            WizardAction::Close => self.controller.close(&mut session)?,
        };

        if session.is_open() {
            self.storage.save(session.clone()).await?;
        } else {
            self.storage.delete(&session.id).await?;
            info!(session_id = %session.id, status = ?session.status, "Wizard session ended");
        }

        Ok(StepResult {
            transition,
            session,
        })
    }
}
