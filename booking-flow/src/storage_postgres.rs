use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    PgExecutor, PgPool, Postgres, Transaction,
    postgres::PgPoolOptions,
    types::Json,
};
use std::sync::Arc;
use tracing::info;

use crate::{
    booking::{Booking, BookingStatus, DraftId, PaymentStatus},
    error::StoreError,
    payload::BookingPayload,
    storage::{BookingStore, SessionStorage, WizardSession},
};

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Open a connection pool shared by the PostgreSQL stores.
pub async fn connect_pool(database_url: &str) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(db_error)
}

/// PostgreSQL implementation of BookingStore.
///
/// The full record lives in a JSONB column; status, client and inspection
/// date are copied into plain columns for querying outside the wizard.
pub struct PostgresBookingStore {
    pool: Arc<PgPool>,
}

impl PostgresBookingStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Self::from_pool(connect_pool(database_url).await?).await
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                client_id TEXT,
                inspection_date TIMESTAMPTZ,
                record JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(db_error)?;

        info!("bookings table ready");
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn write<'e>(executor: impl PgExecutor<'e>, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, status, client_id, inspection_date, record, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                client_id = EXCLUDED.client_id,
                inspection_date = EXCLUDED.inspection_date,
                record = EXCLUDED.record,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(booking.id.as_str())
        .bind(booking.status.as_str())
        .bind(booking.client_id.as_deref())
        .bind(booking.inspection_date)
        .bind(Json(booking))
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(executor)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn lock(
        tx: &mut Transaction<'_, Postgres>,
        id: &DraftId,
    ) -> Result<Option<Booking>, StoreError> {
        let row: Option<(Json<Booking>,)> =
            sqlx::query_as("SELECT record FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(id.as_str())
                .fetch_optional(&mut **tx)
                .await
                .map_err(db_error)?;
        Ok(row.map(|(Json(booking),)| booking))
    }

    /// Read-modify-write of one record under a row lock.
    async fn modify(
        &self,
        id: &DraftId,
        change: impl FnOnce(&mut Booking) + Send,
    ) -> Result<Booking, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let mut booking = Self::lock(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        change(&mut booking);
        Self::write(&mut *tx, &booking).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(booking)
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn create(&self, id: DraftId, payload: BookingPayload) -> Result<Booking, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let now = Utc::now();

        let booking = match Self::lock(&mut tx, &id).await? {
            Some(mut existing) => {
                existing.apply(payload, now);
                existing
            }
            None => Booking::from_payload(id, payload, now),
        };

        Self::write(&mut *tx, &booking).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(booking)
    }

    async fn update(&self, id: &DraftId, payload: BookingPayload) -> Result<Booking, StoreError> {
        self.modify(id, |booking| booking.apply(payload, Utc::now()))
            .await
    }

    async fn get(&self, id: &DraftId) -> Result<Option<Booking>, StoreError> {
        let row: Option<(Json<Booking>,)> =
            sqlx::query_as("SELECT record FROM bookings WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&*self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(|(Json(booking),)| booking))
    }

    async fn list(&self) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<(Json<Booking>,)> =
            sqlx::query_as("SELECT record FROM bookings ORDER BY created_at DESC")
                .fetch_all(&*self.pool)
                .await
                .map_err(db_error)?;
        Ok(rows.into_iter().map(|(Json(booking),)| booking).collect())
    }

    async fn delete(&self, id: &DraftId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;
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
        .await
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
        .await
    }
}

/// PostgreSQL implementation of SessionStorage
pub struct PostgresSessionStorage {
    pool: Arc<PgPool>,
}

impl PostgresSessionStorage {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Self::from_pool(connect_pool(database_url).await?).await
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wizard_sessions (
                id TEXT PRIMARY KEY,
                state JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(db_error)?;

        info!("wizard_sessions table ready");
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl SessionStorage for PostgresSessionStorage {
    async fn save(&self, session: WizardSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO wizard_sessions (id, state, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET state = EXCLUDED.state, updated_at = NOW()
            "#,
        )
        .bind(&session.id)
        .bind(Json(&session))
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<WizardSession>, StoreError> {
        let row: Option<(Json<WizardSession>,)> =
            sqlx::query_as("SELECT state FROM wizard_sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&*self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(|(Json(session),)| session))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM wizard_sessions WHERE id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
