pub mod booking;
pub mod catalog;
pub mod directory;
pub mod error;
pub mod form;
pub mod notify;
pub mod payload;
pub mod persistence;
pub mod runner;
pub mod steps;
pub mod storage;
#[cfg(feature = "postgres")]
pub mod storage_postgres;
pub mod validator;
pub mod wizard;

// Re-export commonly used types
pub use booking::{Booking, BookingStatus, DraftId, PaymentStatus, PropertyDetails};
pub use catalog::{
    Contract, ContractLibrary, ContractStatus, CoverLetter, CoverLetterLibrary, CoverLetterStatus,
    InMemoryCatalog, NewContract, NewCoverLetter, NewProperty, Property, PropertyDirectory,
};
pub use directory::{
    Contact, ContactDirectory, ContactType, ContactUpdate, InMemoryContactDirectory, NewContact,
};
pub use error::{FormError, PersistenceError, Result, StoreError, WizardError};
pub use form::{FormData, FormState, PaymentSummary, Section};
pub use notify::{Notification, NotificationLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use payload::{BookingPayload, DerivedPayload, Parsed, SkippedField, Stage, derive_payload};
pub use persistence::{DraftPersistence, UpsertOutcome};
pub use runner::{StepResult, WizardAction, WizardRunner};
pub use steps::{LAST_STEP, STEP_COUNT, STEPS, Step, StepKind};
pub use storage::{
    BookingStore, InMemoryBookingStore, InMemorySessionStorage, SessionStorage, WizardSession,
    WizardStatus,
};
#[cfg(feature = "postgres")]
pub use storage_postgres::{PostgresBookingStore, PostgresSessionStorage, connect_pool};
pub use validator::{DefaultStepValidator, StepValidator, Verdict};
pub use wizard::{JumpPolicy, Transition, WizardBuilder, WizardController};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    };

    #[derive(Debug, Clone)]
    enum Call {
        Create(Value),
        Update(DraftId, Value),
    }

    /// Booking store that records every create/update and can be told to fail.
    #[derive(Default)]
    struct RecordingStore {
        inner: InMemoryBookingStore,
        calls: Mutex<Vec<Call>>,
        failing: AtomicBool,
    }

    impl RecordingStore {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> std::result::Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(StoreError::Database("connection reset".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl BookingStore for RecordingStore {
        async fn create(
            &self,
            id: DraftId,
            payload: BookingPayload,
        ) -> std::result::Result<Booking, StoreError> {
            self.check()?;
            self.calls
                .lock()
                .unwrap()
                .push(Call::Create(serde_json::to_value(&payload).unwrap()));
            self.inner.create(id, payload).await
        }

        async fn update(
            &self,
            id: &DraftId,
            payload: BookingPayload,
        ) -> std::result::Result<Booking, StoreError> {
            self.check()?;
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(id.clone(), serde_json::to_value(&payload).unwrap()));
            self.inner.update(id, payload).await
        }

        async fn get(&self, id: &DraftId) -> std::result::Result<Option<Booking>, StoreError> {
            self.inner.get(id).await
        }

        async fn list(&self) -> std::result::Result<Vec<Booking>, StoreError> {
            self.inner.list().await
        }

        async fn delete(&self, id: &DraftId) -> std::result::Result<(), StoreError> {
            self.inner.delete(id).await
        }

        async fn update_status(
            &self,
            id: &DraftId,
            status: BookingStatus,
        ) -> std::result::Result<Booking, StoreError> {
            self.inner.update_status(id, status).await
        }

        async fn update_payment_status(
            &self,
            id: &DraftId,
            payment_status: PaymentStatus,
        ) -> std::result::Result<Booking, StoreError> {
            self.inner.update_payment_status(id, payment_status).await
        }
    }

    struct Harness {
        store: Arc<RecordingStore>,
        notifier: Arc<RecordingNotifier>,
        wizard: WizardController,
        session: WizardSession,
    }

    fn harness() -> Harness {
        let store = Arc::new(RecordingStore::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let wizard = WizardBuilder::new(store.clone())
            .notifier(notifier.clone())
            .build();
        Harness {
            store,
            notifier,
            wizard,
            session: WizardSession::new("session-1"),
        }
    }

    fn select_client(session: &mut WizardSession, id: &str) {
        session.form.update(|form| form.client_info.id = id.to_string());
    }

    #[tokio::test]
    async fn next_without_client_warns_and_stays() {
        let mut h = harness();

        let transition = h.wizard.next(&mut h.session).await.unwrap();

        assert!(transition.is_blocked());
        assert_eq!(h.session.current_step, 0);
        assert!(h.session.draft_id.is_none());
        assert!(h.store.calls().is_empty());
        assert_eq!(
            h.notifier.received(),
            vec![Notification::warning(validator::CLIENT_REQUIRED)]
        );
    }

    #[tokio::test]
    async fn first_next_creates_draft_with_client() {
        let mut h = harness();
        select_client(&mut h.session, "c1");

        let transition = h.wizard.next(&mut h.session).await.unwrap();

        assert!(matches!(transition, Transition::Advanced { from: 0, to: 1, .. }));
        assert_eq!(h.session.current_step, 1);
        let calls = h.store.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            Call::Create(payload) => {
                assert_eq!(payload["client_id"], "c1");
                assert_eq!(payload["status"], "draft");
            }
            other => panic!("expected create, got {other:?}"),
        }
        assert_eq!(h.session.draft_id.as_ref(), Some(&h.session.reserved_id));
    }

    #[tokio::test]
    async fn later_saves_update_the_same_draft() {
        let mut h = harness();
        select_client(&mut h.session, "c1");

        for _ in 0..LAST_STEP {
            h.wizard.next(&mut h.session).await.unwrap();
        }
        assert_eq!(h.session.current_step, LAST_STEP);

        let draft_id = h.session.draft_id.clone().unwrap();
        let calls = h.store.calls();
        assert_eq!(calls.len(), LAST_STEP);
        assert!(matches!(calls[0], Call::Create(_)));
        for call in &calls[1..] {
            match call {
                Call::Update(id, payload) => {
                    assert_eq!(id, &draft_id);
                    assert_eq!(payload["status"], "draft");
                }
                other => panic!("expected update, got {other:?}"),
            }
        }
        assert_eq!(h.store.inner.len(), 1);
    }

    #[tokio::test]
    async fn previous_never_touches_the_store() {
        let mut h = harness();
        select_client(&mut h.session, "c1");
        h.wizard.next(&mut h.session).await.unwrap();
        h.wizard.next(&mut h.session).await.unwrap();
        let calls_before = h.store.calls().len();
        let draft_before = h.session.draft_id.clone();

        h.wizard.previous(&mut h.session).unwrap();
        h.wizard.previous(&mut h.session).unwrap();

        assert_eq!(h.session.current_step, 0);
        assert_eq!(h.store.calls().len(), calls_before);
        assert_eq!(h.session.draft_id, draft_before);
    }

    #[tokio::test]
    async fn finish_schedules_and_omits_empty_discount() {
        let mut h = harness();
        select_client(&mut h.session, "c1");
        h.wizard.next(&mut h.session).await.unwrap();
        h.session.form.update(|form| {
            form.payment.price = "500.00".into();
            form.payment.discount = String::new();
            form.payment.method = "credit_card".into();
        });
        h.wizard.jump_to(&mut h.session, LAST_STEP).unwrap();

        let transition = h.wizard.finish(&mut h.session).await.unwrap();

        let booking = match transition {
            Transition::Finished { booking, .. } => booking,
            other => panic!("expected finished, got {other:?}"),
        };
        assert_eq!(booking.status, BookingStatus::Scheduled);
        assert_eq!(h.session.status, WizardStatus::Finished);

        let calls = h.store.calls();
        match calls.last().unwrap() {
            Call::Update(_, payload) => {
                assert_eq!(payload["payment_amount"].as_f64(), Some(500.0));
                assert!(payload.get("payment_discount").is_none());
                assert_eq!(payload["status"], "scheduled");
                assert_eq!(payload["payment_status"], "pending");
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(
            h.notifier.received().last(),
            Some(&Notification::success(wizard::BOOKING_SCHEDULED))
        );
    }

    #[tokio::test]
    async fn only_finish_writes_scheduled() {
        let mut h = harness();
        select_client(&mut h.session, "c1");
        for _ in 0..LAST_STEP {
            h.wizard.next(&mut h.session).await.unwrap();
        }
        h.wizard.finish(&mut h.session).await.unwrap();

        let statuses: Vec<String> = h
            .store
            .calls()
            .iter()
            .map(|call| match call {
                Call::Create(p) | Call::Update(_, p) => p["status"].as_str().unwrap().to_string(),
            })
            .collect();
        let (last, rest) = statuses.split_last().unwrap();
        assert_eq!(last, "scheduled");
        assert!(rest.iter().all(|s| s == "draft"));
    }

    #[tokio::test]
    async fn unreadable_date_is_omitted_but_next_succeeds() {
        let mut h = harness();
        select_client(&mut h.session, "c1");
        h.session
            .form
            .update(|form| form.general_info.date_time = "31/31/2025 25:99".into());

        let transition = h.wizard.next(&mut h.session).await.unwrap();

        match transition {
            Transition::Advanced { skipped, .. } => {
                assert_eq!(skipped.len(), 1);
                assert_eq!(skipped[0].field, "inspection_date");
            }
            other => panic!("expected advance, got {other:?}"),
        }
        match &h.store.calls()[0] {
            Call::Create(payload) => assert!(payload.get("inspection_date").is_none()),
            other => panic!("expected create, got {other:?}"),
        }
        assert_eq!(h.session.current_step, 1);
    }

    #[tokio::test]
    async fn empty_numeric_fields_never_reach_the_payload() {
        let mut h = harness();
        select_client(&mut h.session, "c1");
        h.session.form.update(|form| {
            form.property_info.bedrooms = "3".into();
        });

        h.wizard.next(&mut h.session).await.unwrap();

        let Call::Create(payload) = &h.store.calls()[0] else {
            panic!("expected create");
        };
        let details = &payload["property_details"];
        assert_eq!(details["bedrooms"], 3);
        for key in ["stories", "rooms", "bathrooms", "year_built", "square_footage"] {
            assert!(details.get(key).is_none(), "{key} should be omitted");
        }
        assert!(payload.get("payment_amount").is_none());
        assert!(payload.get("payment_discount").is_none());
    }

    #[tokio::test]
    async fn store_failure_blocks_and_keeps_state() {
        let mut h = harness();
        select_client(&mut h.session, "c1");
        h.store.fail(true);

        let transition = h.wizard.next(&mut h.session).await.unwrap();

        assert!(transition.is_blocked());
        assert_eq!(
            transition.notification().map(|n| n.level),
            Some(NotificationLevel::Error)
        );
        assert_eq!(h.session.current_step, 0);
        assert!(h.session.draft_id.is_none());
        assert_eq!(h.session.form.data().client_info.id, "c1");

        h.store.fail(false);
        h.wizard.next(&mut h.session).await.unwrap();
        assert_eq!(h.session.current_step, 1);
        assert!(h.session.draft_id.is_some());
    }

    #[tokio::test]
    async fn failed_finish_keeps_wizard_open() {
        let mut h = harness();
        select_client(&mut h.session, "c1");
        h.wizard.jump_to(&mut h.session, LAST_STEP).unwrap();
        h.store.fail(true);

        let transition = h.wizard.finish(&mut h.session).await.unwrap();

        assert!(transition.is_blocked());
        assert_eq!(h.session.status, WizardStatus::Open);
        assert_eq!(h.session.current_step, LAST_STEP);

        h.store.fail(false);
        let transition = h.wizard.finish(&mut h.session).await.unwrap();
        assert!(matches!(transition, Transition::Finished { .. }));
    }

    #[tokio::test]
    async fn failed_validation_holds_every_step() {
        struct RejectAll;
        impl StepValidator for RejectAll {
            fn validate(&self, step: usize, _form: &FormData) -> Verdict {
                Verdict::Fail(format!("step {step} incomplete"))
            }
        }

        let mut h = harness();
        select_client(&mut h.session, "c1");
        let wizard = WizardBuilder::new(h.store.clone())
            .validator(Arc::new(RejectAll))
            .build();

        for step in 0..LAST_STEP {
            h.session.current_step = step;
            let transition = wizard.next(&mut h.session).await.unwrap();
            assert!(transition.is_blocked());
            assert_eq!(h.session.current_step, step);
        }
        assert!(h.store.calls().is_empty());
        assert!(h.session.draft_id.is_none());
    }

    #[tokio::test]
    async fn permissive_validator_still_cannot_save_without_client() {
        struct AllowAll;
        impl StepValidator for AllowAll {
            fn validate(&self, _step: usize, _form: &FormData) -> Verdict {
                Verdict::Pass
            }
        }

        let mut h = harness();
        let wizard = WizardBuilder::new(h.store.clone())
            .validator(Arc::new(AllowAll))
            .notifier(h.notifier.clone())
            .build();

        let transition = wizard.next(&mut h.session).await.unwrap();

        assert!(transition.is_blocked());
        assert!(h.store.calls().is_empty());
        assert_eq!(h.session.current_step, 0);
    }
}
