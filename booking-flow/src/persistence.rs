use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    booking::{Booking, DraftId},
    error::PersistenceError,
    form::FormData,
    payload::{SkippedField, Stage, derive_payload},
    steps::FIRST_STEP,
    storage::BookingStore,
};

/// Result of a successful [`DraftPersistence::upsert`].
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub booking: Booking,
    /// Fields dropped from the payload because their input was unreadable.
    pub skipped: Vec<SkippedField>,
}

/// Saves the wizard form as a single booking per session.
///
/// The session's draft id is passed in on every call. The first successful
/// save creates the booking under the session's reserved id and fills the
/// draft id; later saves update that id. Creating under a reserved id makes
/// a repeated first save land on the same record.
#[derive(Clone)]
pub struct DraftPersistence {
    store: Arc<dyn BookingStore>,
}

impl DraftPersistence {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    /// Create or update the session's booking from `form` as saved on `step`.
    ///
    /// Saving the last step writes status `scheduled`; any other step writes
    /// `draft`. On error `draft_id` is left exactly as it was.
    pub async fn upsert(
        &self,
        form: &FormData,
        step: usize,
        reserved_id: &DraftId,
        draft_id: &mut Option<DraftId>,
    ) -> Result<UpsertOutcome, PersistenceError> {
        if step == FIRST_STEP && !form.client_info.has_selection() {
            return Err(PersistenceError::ClientRequired);
        }

        let stage = Stage::for_step(step);
        let derived = derive_payload(form, stage);
        for skipped in &derived.skipped {
            debug!(field = skipped.field, raw = %skipped.raw, "Omitting unreadable field from booking payload");
        }

        let created = draft_id.is_none();
        let booking = match draft_id.clone() {
            Some(id) => self.store.update(&id, derived.payload).await?,
            None => {
                let booking = self.store.create(reserved_id.clone(), derived.payload).await?;
                *draft_id = Some(booking.id.clone());
                booking
            }
        };

        info!(
            booking_id = %booking.id,
            step,
            status = booking.status.as_str(),
            created,
            "Booking saved"
        );

        Ok(UpsertOutcome {
            booking,
            skipped: derived.skipped,
        })
    }
}
