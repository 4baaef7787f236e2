use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    booking::{Booking, BookingStatus, DraftId, PaymentStatus},
    error::StoreError,
    form::{FormData, FormState},
    payload::BookingPayload,
    steps::{FIRST_STEP, StepKind},
};

/// Lifecycle of a wizard session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStatus {
    /// Steps can be edited and navigated.
    Open,
    /// The booking was submitted as scheduled.
    Finished,
    /// Abandoned by the user. Any saved draft stays in the store.
    Closed,
}

/// State of one wizard instance.
///
/// The draft id is `None` until the first successful save; after that every
/// save in this session updates the same booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSession {
    pub id: String,
    pub current_step: usize,
    pub form: FormState,
    /// Id the booking is created under. Fixed when the session opens, so a
    /// first save that is repeated after a lost session write still targets
    /// one record.
    #[serde(default)]
    pub reserved_id: DraftId,
    pub draft_id: Option<DraftId>,
    pub status: WizardStatus,
    pub created_at: DateTime<Utc>,
}

impl WizardSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_form(id, FormData::default())
    }

    pub fn with_form(id: impl Into<String>, form: FormData) -> Self {
        Self {
            id: id.into(),
            current_step: FIRST_STEP,
            form: FormState::new(form),
            reserved_id: DraftId::new(),
            draft_id: None,
            status: WizardStatus::Open,
            created_at: Utc::now(),
        }
    }

    pub fn current(&self) -> Option<StepKind> {
        StepKind::from_index(self.current_step)
    }

    pub fn is_open(&self) -> bool {
        self.status == WizardStatus::Open
    }
}

/// Booking persistence collaborator.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Create the booking under `id`. When `id` already exists the payload
    /// is applied as an update instead, so repeating a create is harmless.
    async fn create(&self, id: DraftId, payload: BookingPayload) -> Result<Booking, StoreError>;
    /// Overwrites the fields present in `payload`; absent optional fields
    /// keep their stored value.
    async fn update(&self, id: &DraftId, payload: BookingPayload) -> Result<Booking, StoreError>;
    async fn get(&self, id: &DraftId) -> Result<Option<Booking>, StoreError>;
    async fn list(&self) -> Result<Vec<Booking>, StoreError>;
    async fn delete(&self, id: &DraftId) -> Result<(), StoreError>;
    async fn update_status(
        &self,
        id: &DraftId,
        status: BookingStatus,
    ) -> Result<Booking, StoreError>;
    async fn update_payment_status(
        &self,
        id: &DraftId,
        payment_status: PaymentStatus,
    ) -> Result<Booking, StoreError>;
}

/// Trait for storing and retrieving wizard sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: WizardSession) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Option<WizardSession>, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// In-memory implementation of BookingStore
pub struct InMemoryBookingStore {
    bookings: Arc<DashMap<DraftId, Booking>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self {
            bookings: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    fn modify(
        &self,
        id: &DraftId,
        change: impl FnOnce(&mut Booking),
    ) -> Result<Booking, StoreError> {
        let mut entry = self
            .bookings
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        change(entry.value_mut());
        Ok(entry.clone())
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create(&self, id: DraftId, payload: BookingPayload) -> Result<Booking, StoreError> {
        let now = Utc::now();
        let booking = match self.bookings.entry(id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().apply(payload, now);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let booking = Booking::from_payload(entry.key().clone(), payload, now);
                entry.insert(booking.clone());
                booking
            }
        };
        Ok(booking)
    }

    async fn update(&self, id: &DraftId, payload: BookingPayload) -> Result<Booking, StoreError> {
        self.modify(id, |booking| booking.apply(payload, Utc::now()))
    }

    async fn get(&self, id: &DraftId) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.get(id).map(|entry| entry.clone()))
    }

    async fn list(&self) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> =
            self.bookings.iter().map(|entry| entry.value().clone()).collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn delete(&self, id: &DraftId) -> Result<(), StoreError> {
        self.bookings.remove(id);
        Ok(())
    }

    async fn update_status(
        &self,
        id: &DraftId,
        status: BookingStatus,
    ) -> Result<Booking, StoreError> {
        self.modify(id, |booking| {
            booking.status = status;
            booking.updated_at = Utc::now();
        })
    }

    async fn update_payment_status(
        &self,
        id: &DraftId,
        payment_status: PaymentStatus,
    ) -> Result<Booking, StoreError> {
        self.modify(id, |booking| {
            booking.payment_status = payment_status;
            booking.updated_at = Utc::now();
        })
    }
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, WizardSession>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: WizardSession) -> Result<(), StoreError> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<WizardSession>, StoreError> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Stage, derive_payload};

    #[tokio::test]
    async fn in_memory_store_round_trip() {
        let store = InMemoryBookingStore::new();
        let mut form = FormData::default();
        form.client_info.id = "c1".into();

        let created = store
            .create(DraftId::from("b1"), derive_payload(&form, Stage::Draft).payload)
            .await
            .unwrap();
        assert_eq!(created.id, DraftId::from("b1"));
        assert_eq!(created.status, BookingStatus::Draft);
        assert_eq!(store.len(), 1);

        let paid = store
            .update_payment_status(&created.id, PaymentStatus::Paid)
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        let cancelled = store
            .update_status(&created.id, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(store.list().await.unwrap().len(), 1);

        store.delete(&created.id).await.unwrap();
        assert!(store.get(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn repeated_create_updates_the_existing_booking() {
        let store = InMemoryBookingStore::new();
        let id = DraftId::from("b1");
        let mut form = FormData::default();
        form.client_info.id = "c1".into();

        let first = store
            .create(id.clone(), derive_payload(&form, Stage::Draft).payload)
            .await
            .unwrap();
        form.general_info.notes = "gate code 1234".into();
        let second = store
            .create(id.clone(), derive_payload(&form, Stage::Draft).payload)
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.notes, "gate code 1234");
    }

    #[tokio::test]
    async fn update_of_unknown_booking_is_not_found() {
        let store = InMemoryBookingStore::new();
        let payload = derive_payload(&FormData::default(), Stage::Draft).payload;

        let err = store.update(&DraftId::from("nope"), payload).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("nope".into()));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn session_storage_round_trip() {
        let storage = InMemorySessionStorage::new();
        let session = WizardSession::new("s1");

        storage.save(session.clone()).await.unwrap();
        assert_eq!(storage.get("s1").await.unwrap(), Some(session));

        storage.delete("s1").await.unwrap();
        assert!(storage.get("s1").await.unwrap().is_none());
    }
}
