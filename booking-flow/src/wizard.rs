//! The booking wizard state machine.
//!
//! [`WizardController`] holds no per-session state. Each action takes the
//! [`WizardSession`] to act on, so one controller can be shared by every
//! session the service runs.
//!
//! Transitions:
//! * `next` (steps `0..N-1`): validate, save as draft, advance.
//! * `previous` (steps `1..=N-1`): go back one step, never saves.
//! * `jump_to`: move to any step; see [`JumpPolicy`].
//! * `finish` (step `N-1` only): save as scheduled, end the session.
//! * `close`: abandon the session; a saved draft stays in the store.
//!
//! Validation and save failures leave the session on its current step and
//! come back as [`Transition::Blocked`] with the notification shown to the
//! user. Only misuse (wrong step, closed session) is an `Err`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    booking::{Booking, DraftId},
    error::{PersistenceError, Result, WizardError},
    notify::{Notification, Notifier, TracingNotifier},
    payload::SkippedField,
    persistence::DraftPersistence,
    steps::{FIRST_STEP, LAST_STEP, STEP_COUNT},
    storage::{BookingStore, WizardSession, WizardStatus},
    validator::{CLIENT_REQUIRED, DefaultStepValidator, StepValidator, Verdict},
};

pub const SAVE_FAILED: &str = "Failed to save the booking details";
pub const FINISH_FAILED: &str = "Failed to finalize the booking";
pub const BOOKING_SCHEDULED: &str = "Booking created successfully";

/// How clicking a step indicator interacts with validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpPolicy {
    /// Jump anywhere without validating, as the step indicator always has.
    /// Unlike `next`, this skips the validator entirely.
    #[default]
    Unrestricted,
    /// Forward jumps must pass the validator for the current step and every
    /// step skipped over. Backward jumps are always allowed.
    ValidatedForward,
}

/// What an action did to the session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Transition {
    Advanced {
        from: usize,
        to: usize,
        draft_id: DraftId,
        skipped: Vec<SkippedField>,
    },
    Retreated {
        from: usize,
        to: usize,
    },
    Jumped {
        from: usize,
        to: usize,
    },
    Blocked {
        step: usize,
        notification: Notification,
    },
    Finished {
        booking: Booking,
        notification: Notification,
    },
    Closed {
        draft_id: Option<DraftId>,
    },
}

impl Transition {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Transition::Blocked { .. })
    }

    pub fn notification(&self) -> Option<&Notification> {
        match self {
            Transition::Blocked { notification, .. } | Transition::Finished { notification, .. } => {
                Some(notification)
            }
            _ => None,
        }
    }
}

/// Drives [`WizardSession`]s through the booking steps.
pub struct WizardController {
    persistence: DraftPersistence,
    validator: Arc<dyn StepValidator>,
    notifier: Arc<dyn Notifier>,
    jump_policy: JumpPolicy,
}

impl WizardController {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        WizardBuilder::new(store).build()
    }

    pub fn jump_policy(&self) -> JumpPolicy {
        self.jump_policy
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        self.persistence.store()
    }

    fn ensure_open(&self, session: &WizardSession, action: &'static str) -> Result<()> {
        if session.is_open() {
            Ok(())
        } else {
            Err(WizardError::InvalidTransition {
                action,
                step: session.current_step,
            })
        }
    }

    fn block(&self, session: &WizardSession, notification: Notification) -> Transition {
        self.notifier.notify(notification.clone());
        Transition::Blocked {
            step: session.current_step,
            notification,
        }
    }

    /// Validate the current step, save the draft and advance one step.
    pub async fn next(&self, session: &mut WizardSession) -> Result<Transition> {
        self.ensure_open(session, "next")?;
        let from = session.current_step;
        if from >= LAST_STEP {
            return Err(WizardError::InvalidTransition { action: "next", step: from });
        }

        if let Verdict::Fail(reason) = self.validator.validate(from, session.form.data()) {
            warn!(session_id = %session.id, step = from, reason = %reason, "Step validation failed");
            return Ok(self.block(session, Notification::warning(reason)));
        }

        match self
            .persistence
            .upsert(
                session.form.data(),
                from,
                &session.reserved_id,
                &mut session.draft_id,
            )
            .await
        {
            Ok(outcome) => {
                session.current_step = from + 1;
                info!(session_id = %session.id, from, to = from + 1, "Advanced to next step");
                Ok(Transition::Advanced {
                    from,
                    to: from + 1,
                    draft_id: outcome.booking.id,
                    skipped: outcome.skipped,
                })
            }
            Err(PersistenceError::ClientRequired) => {
                warn!(session_id = %session.id, step = from, "Save refused without a client");
                Ok(self.block(session, Notification::warning(CLIENT_REQUIRED)))
            }
            Err(PersistenceError::Store(e)) => {
                error!(session_id = %session.id, step = from, error = %e, "Failed to save booking");
                Ok(self.block(session, Notification::error(SAVE_FAILED)))
            }
        }
    }

    /// Go back one step. Never validates and never saves.
    pub fn previous(&self, session: &mut WizardSession) -> Result<Transition> {
        self.ensure_open(session, "previous")?;
        let from = session.current_step;
        if from == FIRST_STEP {
            return Err(WizardError::InvalidTransition { action: "previous", step: from });
        }
        session.current_step = from - 1;
        Ok(Transition::Retreated { from, to: from - 1 })
    }

    /// Move straight to `target`. Never saves.
    pub fn jump_to(&self, session: &mut WizardSession, target: usize) -> Result<Transition> {
        self.ensure_open(session, "jump")?;
        if target >= STEP_COUNT {
            return Err(WizardError::StepOutOfRange(target));
        }
        let from = session.current_step;

        if self.jump_policy == JumpPolicy::ValidatedForward {
            for step in from..target {
                if let Verdict::Fail(reason) = self.validator.validate(step, session.form.data()) {
                    warn!(session_id = %session.id, step, target, reason = %reason, "Jump blocked by validation");
                    return Ok(self.block(session, Notification::warning(reason)));
                }
            }
        }

        session.current_step = target;
        info!(session_id = %session.id, from, to = target, "Jumped to step");
        Ok(Transition::Jumped { from, to: target })
    }

    /// Save the booking as scheduled and end the session.
    pub async fn finish(&self, session: &mut WizardSession) -> Result<Transition> {
        self.ensure_open(session, "finish")?;
        if session.current_step != LAST_STEP {
            return Err(WizardError::InvalidTransition {
                action: "finish",
                step: session.current_step,
            });
        }

        match self
            .persistence
            .upsert(
                session.form.data(),
                LAST_STEP,
                &session.reserved_id,
                &mut session.draft_id,
            )
            .await
        {
            Ok(outcome) => {
                session.status = WizardStatus::Finished;
                let notification = Notification::success(BOOKING_SCHEDULED);
                self.notifier.notify(notification.clone());
                info!(session_id = %session.id, booking_id = %outcome.booking.id, "Booking scheduled");
                Ok(Transition::Finished {
                    booking: outcome.booking,
                    notification,
                })
            }
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Failed to finalize booking");
                Ok(self.block(session, Notification::error(FINISH_FAILED)))
            }
        }
    }

    /// Abandon the session. The saved draft, if any, is left untouched.
    pub fn close(&self, session: &mut WizardSession) -> Result<Transition> {
        if session.status == WizardStatus::Closed {
            return Err(WizardError::InvalidTransition {
                action: "close",
                step: session.current_step,
            });
        }
        session.status = WizardStatus::Closed;
        info!(session_id = %session.id, draft_id = ?session.draft_id, "Wizard closed");
        Ok(Transition::Closed {
            draft_id: session.draft_id.clone(),
        })
    }
}

/// Builder for [`WizardController`]
pub struct WizardBuilder {
    store: Arc<dyn BookingStore>,
    validator: Arc<dyn StepValidator>,
    notifier: Arc<dyn Notifier>,
    jump_policy: JumpPolicy,
}

impl WizardBuilder {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self {
            store,
            validator: Arc::new(DefaultStepValidator),
            notifier: Arc::new(TracingNotifier),
            jump_policy: JumpPolicy::default(),
        }
    }

    pub fn validator(mut self, validator: Arc<dyn StepValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn jump_policy(mut self, jump_policy: JumpPolicy) -> Self {
        self.jump_policy = jump_policy;
        self
    }

    pub fn build(self) -> WizardController {
        WizardController {
            persistence: DraftPersistence::new(self.store),
            validator: self.validator,
            notifier: self.notifier,
            jump_policy: self.jump_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{notify::NotificationLevel, storage::InMemoryBookingStore};

    fn controller(policy: JumpPolicy) -> WizardController {
        WizardBuilder::new(Arc::new(InMemoryBookingStore::new()))
            .jump_policy(policy)
            .build()
    }

    #[test]
    fn previous_at_first_step_is_rejected() {
        let wizard = controller(JumpPolicy::Unrestricted);
        let mut session = WizardSession::new("s");

        assert_eq!(
            wizard.previous(&mut session).unwrap_err(),
            WizardError::InvalidTransition { action: "previous", step: 0 }
        );
        assert_eq!(session.current_step, 0);
    }

    #[test]
    fn unrestricted_jump_skips_validation() {
        let wizard = controller(JumpPolicy::Unrestricted);
        let mut session = WizardSession::new("s");

        let transition = wizard.jump_to(&mut session, LAST_STEP).unwrap();
        assert!(matches!(transition, Transition::Jumped { from: 0, to: 7 }));
        assert_eq!(session.current_step, LAST_STEP);
        assert!(session.draft_id.is_none());
    }

    #[test]
    fn validated_jump_blocks_forward_but_not_backward() {
        let wizard = controller(JumpPolicy::ValidatedForward);
        let mut session = WizardSession::new("s");

        let transition = wizard.jump_to(&mut session, 3).unwrap();
        assert!(transition.is_blocked());
        assert_eq!(
            transition.notification().map(|n| n.level),
            Some(NotificationLevel::Warning)
        );
        assert_eq!(session.current_step, 0);

        session.form.update(|form| form.client_info.id = "c1".into());
        wizard.jump_to(&mut session, 3).unwrap();
        assert_eq!(session.current_step, 3);

        session.form.update(|form| form.client_info.id.clear());
        wizard.jump_to(&mut session, 0).unwrap();
        assert_eq!(session.current_step, 0);
    }

    #[test]
    fn jump_out_of_range_is_an_error() {
        let wizard = controller(JumpPolicy::Unrestricted);
        let mut session = WizardSession::new("s");

        assert_eq!(
            wizard.jump_to(&mut session, STEP_COUNT).unwrap_err(),
            WizardError::StepOutOfRange(STEP_COUNT)
        );
    }

    #[tokio::test]
    async fn next_and_finish_are_bounded_by_step() {
        let wizard = controller(JumpPolicy::Unrestricted);
        let mut session = WizardSession::new("s");

        assert!(matches!(
            wizard.finish(&mut session).await,
            Err(WizardError::InvalidTransition { action: "finish", step: 0 })
        ));

        wizard.jump_to(&mut session, LAST_STEP).unwrap();
        assert!(matches!(
            wizard.next(&mut session).await,
            Err(WizardError::InvalidTransition { action: "next", step: 7 })
        ));
    }

    #[tokio::test]
    async fn closed_session_rejects_every_action() {
        let wizard = controller(JumpPolicy::Unrestricted);
        let mut session = WizardSession::new("s");

        assert!(matches!(
            wizard.close(&mut session).unwrap(),
            Transition::Closed { draft_id: None }
        ));
        assert!(wizard.next(&mut session).await.is_err());
        assert!(wizard.jump_to(&mut session, 1).is_err());
        assert!(wizard.close(&mut session).is_err());
        assert_eq!(session.status, WizardStatus::Closed);
    }
}
