use thiserror::Error;

use crate::form::Section;

/// Errors raised by a [`BookingStore`](crate::storage::BookingStore) or a
/// [`SessionStorage`](crate::storage::SessionStorage) backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Errors raised while editing the wizard form.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("Unknown form section: {0}")]
    UnknownSection(String),

    #[error("Patch for section {0} must be a JSON object")]
    NotAnObject(Section),

    #[error("Invalid patch for section {section}: {reason}")]
    InvalidPatch { section: Section, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by [`DraftPersistence`](crate::persistence::DraftPersistence).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("A client must be selected before the booking can be saved")]
    ClientRequired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by the wizard controller and runner.
///
/// Validation and persistence failures are not errors: they come back as
/// [`Transition::Blocked`](crate::wizard::Transition::Blocked).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WizardError {
    #[error("Action '{action}' is not allowed at step {step}")]
    InvalidTransition { action: &'static str, step: usize },

    #[error("Step {0} is out of range")]
    StepOutOfRange(usize),

    #[error("Session {0} already has an action in progress")]
    Busy(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, WizardError>;
