use serde::Serialize;

use crate::{form::FormData, steps::StepKind};

pub const CLIENT_REQUIRED: &str = "Please select a client to continue";

/// Outcome of checking a step before leaving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Rules deciding whether the wizard may advance past a step.
pub trait StepValidator: Send + Sync {
    fn validate(&self, step: usize, form: &FormData) -> Verdict;
}

/// Rule set used by the booking wizard.
///
/// Only the client step blocks: a client has to be picked from the
/// directory. Every other step advances freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStepValidator;

impl StepValidator for DefaultStepValidator {
    fn validate(&self, step: usize, form: &FormData) -> Verdict {
        match StepKind::from_index(step) {
            Some(StepKind::ClientInfo) if !form.client_info.has_selection() => {
                Verdict::Fail(CLIENT_REQUIRED.to_string())
            }
            _ => Verdict::Pass,
        }
    }
}
