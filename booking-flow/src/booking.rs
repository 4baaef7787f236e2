use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{form::FormData, payload::BookingPayload};

/// Opaque id of a persisted booking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(String);

impl DraftId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DraftId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for DraftId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DraftId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Draft,
    Scheduled,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Draft => "draft",
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Partial,
    Refunded,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub building_type: String,
    pub dwelling_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stories: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_built: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub square_footage: Option<i32>,
}

impl PropertyDetails {
    fn merge(&mut self, incoming: PropertyDetails) {
        self.building_type = incoming.building_type;
        self.dwelling_type = incoming.dwelling_type;
        merge_option(&mut self.stories, incoming.stories);
        merge_option(&mut self.rooms, incoming.rooms);
        merge_option(&mut self.bathrooms, incoming.bathrooms);
        merge_option(&mut self.bedrooms, incoming.bedrooms);
        merge_option(&mut self.year_built, incoming.year_built);
        merge_option(&mut self.square_footage, incoming.square_footage);
    }
}

/// A booking as held by the booking store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: DraftId,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub client_id: Option<String>,
    pub property_address: String,
    pub property_unit: String,
    pub inspection_type: String,
    pub inspection_date: Option<DateTime<Utc>>,
    pub notes: String,
    pub payment_method: String,
    pub payment_amount: Option<f64>,
    pub payment_discount: Option<f64>,
    pub contract_id: Option<String>,
    pub cover_letter_id: Option<String>,
    pub property_details: PropertyDetails,
    pub form_data: FormData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Build a new record from a create payload. Payment status falls back
    /// to pending when the payload carries none.
    pub fn from_payload(id: DraftId, payload: BookingPayload, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: payload.status,
            payment_status: payload.payment_status.unwrap_or_default(),
            client_id: payload.client_id,
            property_address: payload.property_address,
            property_unit: payload.property_unit,
            inspection_type: payload.inspection_type,
            inspection_date: payload.inspection_date,
            notes: payload.notes,
            payment_method: payload.payment_method,
            payment_amount: payload.payment_amount,
            payment_discount: payload.payment_discount,
            contract_id: payload.contract_id,
            cover_letter_id: payload.cover_letter_id,
            property_details: payload.property_details,
            form_data: payload.form_data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update payload. Fields the payload omits keep their stored
    /// value; `created_at` never changes.
    pub fn apply(&mut self, payload: BookingPayload, now: DateTime<Utc>) {
        self.status = payload.status;
        merge_option_into(&mut self.payment_status, payload.payment_status);
        merge_option(&mut self.client_id, payload.client_id);
        self.property_address = payload.property_address;
        self.property_unit = payload.property_unit;
        self.inspection_type = payload.inspection_type;
        merge_option(&mut self.inspection_date, payload.inspection_date);
        self.notes = payload.notes;
        self.payment_method = payload.payment_method;
        merge_option(&mut self.payment_amount, payload.payment_amount);
        merge_option(&mut self.payment_discount, payload.payment_discount);
        merge_option(&mut self.contract_id, payload.contract_id);
        merge_option(&mut self.cover_letter_id, payload.cover_letter_id);
        self.property_details.merge(payload.property_details);
        self.form_data = payload.form_data;
        self.updated_at = now;
    }
}

fn merge_option<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}

fn merge_option_into<T>(slot: &mut T, incoming: Option<T>) {
    if let Some(value) = incoming {
        *slot = value;
    }
}
