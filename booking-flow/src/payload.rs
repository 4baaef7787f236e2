//! Mapping from wizard [`FormData`] to the payload sent to the booking store.
//!
//! Derived fields are best-effort: an empty or unreadable value never fails
//! the save, it is simply left out of the payload. Each derived value goes
//! through [`Parsed`] so callers can tell "nothing entered" from "entered but
//! unreadable".

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    booking::{BookingStatus, PaymentStatus, PropertyDetails},
    form::FormData,
    steps::LAST_STEP,
};

/// Outcome of reading one optional field from its string form.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Value(T),
    Absent,
    Invalid { raw: String },
}

impl<T> Parsed<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Parsed::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Parsed::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Parsed::Invalid { .. })
    }
}

fn parse_with<T>(raw: &str, parse: impl FnOnce(&str) -> Option<T>) -> Parsed<T> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Parsed::Absent;
    }
    match parse(trimmed) {
        Some(value) => Parsed::Value(value),
        None => Parsed::Invalid {
            raw: raw.to_string(),
        },
    }
}

/// Monetary amount such as `"500.00"`. Non-finite values are unreadable.
pub fn parse_amount(raw: &str) -> Parsed<f64> {
    parse_with(raw, |s| s.parse::<f64>().ok().filter(|v| v.is_finite()))
}

/// Whole-number count such as stories, rooms or square footage.
///
/// Fractions are truncated toward zero, so `"2.5"` bathrooms count as 2.
/// Values outside the `i32` range are unreadable.
pub fn parse_count(raw: &str) -> Parsed<i32> {
    parse_with(raw, |s| {
        s.parse::<i32>().ok().or_else(|| {
            s.parse::<f64>()
                .ok()
                .map(f64::trunc)
                .filter(|v| v.is_finite() && (i32::MIN as f64..=i32::MAX as f64).contains(v))
                .map(|v| v as i32)
        })
    })
}

const NAIVE_DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Inspection date/time as entered in the general-info step.
///
/// Accepts RFC 3339, `datetime-local` style values (`2025-04-25T10:00`) and
/// bare dates. Values without an offset are read as UTC.
pub fn parse_inspection_date(raw: &str) -> Parsed<DateTime<Utc>> {
    parse_with(raw, |s| {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_DATE_TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .map(|naive| naive.and_utc())
    })
}

/// Whether a save is an intermediate step or the final submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Draft,
    Final,
}

impl Stage {
    pub fn for_step(step: usize) -> Self {
        if step == LAST_STEP {
            Stage::Final
        } else {
            Stage::Draft
        }
    }

    pub fn status(self) -> BookingStatus {
        match self {
            Stage::Draft => BookingStatus::Draft,
            Stage::Final => BookingStatus::Scheduled,
        }
    }
}

/// Create/update body for the booking store. Every optional key is left out
/// of the serialized form when absent; it is never sent as null, zero or
/// an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingPayload {
    pub property_address: String,
    pub property_unit: String,
    pub inspection_type: String,
    pub notes: String,
    pub payment_method: String,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspection_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_discount: Option<f64>,
    pub property_details: PropertyDetails,
    /// The whole form, kept so a draft can be reopened later.
    pub form_data: FormData,
}

/// A field left out of the payload because its input could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedField {
    pub field: &'static str,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedPayload {
    pub payload: BookingPayload,
    pub skipped: Vec<SkippedField>,
}

/// Collects parse outcomes and remembers the unreadable ones.
#[derive(Default)]
struct Extractor {
    skipped: Vec<SkippedField>,
}

impl Extractor {
    fn take<T>(&mut self, field: &'static str, parsed: Parsed<T>) -> Option<T> {
        match parsed {
            Parsed::Value(v) => Some(v),
            Parsed::Absent => None,
            Parsed::Invalid { raw } => {
                self.skipped.push(SkippedField { field, raw });
                None
            }
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Build the store payload for `form`. Pure: no I/O, no clock.
pub fn derive_payload(form: &FormData, stage: Stage) -> DerivedPayload {
    let general = &form.general_info;
    let property = &form.property_info;
    let payment = &form.payment;
    let mut ex = Extractor::default();

    let payment_status = (stage == Stage::Final && !payment.method.trim().is_empty())
        .then_some(PaymentStatus::Pending);

    let property_details = PropertyDetails {
        building_type: property.building_type.clone(),
        dwelling_type: property.dwelling_type.clone(),
        stories: ex.take("stories", parse_count(&property.stories)),
        rooms: ex.take("rooms", parse_count(&property.rooms)),
        bathrooms: ex.take("bathrooms", parse_count(&property.bathrooms)),
        bedrooms: ex.take("bedrooms", parse_count(&property.bedrooms)),
        year_built: ex.take("year_built", parse_count(&property.year_built)),
        square_footage: ex.take("square_footage", parse_count(&property.square_footage)),
    };

    let payload = BookingPayload {
        property_address: general.inspection_address.clone(),
        property_unit: general.address_unit.clone(),
        inspection_type: general.inspection_type.clone(),
        notes: general.notes.clone(),
        payment_method: payment.method.clone(),
        status: stage.status(),
        payment_status,
        inspection_date: ex.take("inspection_date", parse_inspection_date(&general.date_time)),
        client_id: non_empty(&form.client_info.id),
        contract_id: non_empty(&form.agreement.selected_contract),
        cover_letter_id: form
            .cover_letter
            .selected_cover_letter
            .as_deref()
            .and_then(non_empty),
        payment_amount: ex.take("payment_amount", parse_amount(&payment.price)),
        payment_discount: ex.take("payment_discount", parse_amount(&payment.discount)),
        property_details,
        form_data: form.clone(),
    };

    DerivedPayload {
        payload,
        skipped: ex.skipped,
    }
}
