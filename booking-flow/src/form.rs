//! Wizard form data and the [`FormState`] container that step views write into.
//!
//! Every field is a plain string (amounts and counts included) so a freshly
//! opened wizard already holds a complete, serializable record. Typed values
//! are only derived later, when a payload is built for the booking store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::{
    catalog::{Contract, CoverLetter as CoverLetterRecord, Property},
    directory::Contact,
    error::FormError,
    payload::parse_inspection_date,
};

/// Stored shape of the inspection date/time, minute precision, UTC.
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct GeneralInfo {
    pub address_unit: String,
    pub inspection_address: String,
    pub inspection_type: String,
    pub date_time: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ClientInfo {
    /// Directory id of the selected client. Empty until a client is picked.
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub county: String,
    pub notes: String,
}

impl ClientInfo {
    /// True when a client was picked from the directory, not merely typed in.
    pub fn has_selection(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AgentInfo {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub county: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PropertyInfo {
    pub building_type: String,
    pub dwelling_type: String,
    pub stories: String,
    pub rooms: String,
    pub bathrooms: String,
    pub bedrooms: String,
    pub year_built: String,
    pub square_footage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Agreement {
    pub selected_contract: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CoverLetter {
    pub selected_cover_letter: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Payment {
    pub price: String,
    pub method: String,
    pub split: String,
    pub discount: String,
}

/// Totals shown on the payment and review steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaymentSummary {
    pub price: f64,
    pub discount: f64,
    pub total: f64,
}

impl Payment {
    /// Empty or unreadable amounts count as zero here; the persisted payload
    /// omits them instead.
    pub fn summary(&self) -> PaymentSummary {
        let amount = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        };
        let price = amount(&self.price);
        let discount = amount(&self.discount);
        PaymentSummary {
            price,
            discount,
            total: price - discount,
        }
    }
}

/// The wizard's working record, one section per step view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormData {
    pub general_info: GeneralInfo,
    pub client_info: ClientInfo,
    pub agent_info: AgentInfo,
    pub property_info: PropertyInfo,
    pub agreement: Agreement,
    pub cover_letter: CoverLetter,
    pub payment: Payment,
}

/// Addressable sections of [`FormData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    GeneralInfo,
    ClientInfo,
    AgentInfo,
    PropertyInfo,
    Agreement,
    CoverLetter,
    Payment,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::GeneralInfo,
        Section::ClientInfo,
        Section::AgentInfo,
        Section::PropertyInfo,
        Section::Agreement,
        Section::CoverLetter,
        Section::Payment,
    ];

    /// Key of the section inside serialized [`FormData`].
    pub fn key(self) -> &'static str {
        match self {
            Section::GeneralInfo => "generalInfo",
            Section::ClientInfo => "clientInfo",
            Section::AgentInfo => "agentInfo",
            Section::PropertyInfo => "propertyInfo",
            Section::Agreement => "agreement",
            Section::CoverLetter => "coverLetter",
            Section::Payment => "payment",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Section {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars().filter(|c| *c != '_' && *c != '-').collect();
        Section::ALL
            .into_iter()
            .find(|section| section.key().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| FormError::UnknownSection(s.to_string()))
    }
}

/// Container for the wizard's [`FormData`].
///
/// Purely a holder: it never validates wizard rules. Setters either replace
/// the whole record or merge a partial update into one section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormState {
    data: FormData,
}

impl FormState {
    pub fn new(data: FormData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &FormData {
        &self.data
    }

    pub fn into_inner(self) -> FormData {
        self.data
    }

    pub fn replace(&mut self, data: FormData) {
        self.data = data;
    }

    pub fn update(&mut self, f: impl FnOnce(&mut FormData)) {
        f(&mut self.data);
    }

    /// Merge the keys of a JSON object into one section.
    ///
    /// Keys absent from `fields` keep their current value. Unknown keys or
    /// values of the wrong type reject the whole patch and leave the form
    /// unchanged.
    pub fn merge_section(&mut self, section: Section, fields: Value) -> Result<(), FormError> {
        let Value::Object(fields) = fields else {
            return Err(FormError::NotAnObject(section));
        };

        let mut whole = serde_json::to_value(&self.data)
            .map_err(|e| FormError::Serialization(e.to_string()))?;
        let target = whole
            .get_mut(section.key())
            .and_then(Value::as_object_mut)
            .ok_or_else(|| FormError::UnknownSection(section.key().to_string()))?;
        target.extend(fields);

        self.data = serde_json::from_value(whole).map_err(|e| FormError::InvalidPatch {
            section,
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Store an inspection date/time the way the general-info view does.
    ///
    /// Empty input clears the field. Readable input is normalized to UTC at
    /// minute precision, so an offset in the input shifts the stored time.
    /// Unreadable input is ignored and the previous value stays. Returns
    /// whether the field changed.
    pub fn set_date_time(&mut self, raw: &str) -> bool {
        let raw = raw.trim();
        if raw.is_empty() {
            self.data.general_info.date_time.clear();
            return true;
        }
        let Some(instant) = parse_inspection_date(raw).into_option() else {
            return false;
        };
        self.data.general_info.date_time = instant.format(DATE_TIME_FORMAT).to_string();
        true
    }

    /// Copy a directory contact into the client section.
    pub fn select_client(&mut self, contact: &Contact) {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        self.data.client_info = ClientInfo {
            id: contact.id.clone(),
            name: contact.name.clone(),
            phone: text(&contact.phone),
            email: text(&contact.email),
            address: text(&contact.address),
            city: text(&contact.city),
            state: text(&contact.province),
            zip: text(&contact.zip_code),
            county: text(&contact.country),
            notes: text(&contact.notes),
        };
    }

    /// Copy a catalog property into the property section. Counts the
    /// property does not record become empty strings.
    pub fn select_property(&mut self, property: &Property) {
        let count = |value: Option<i32>| value.map(|v| v.to_string()).unwrap_or_default();
        self.data.property_info = PropertyInfo {
            building_type: property.building_type.clone().unwrap_or_default(),
            dwelling_type: property.dwelling.clone().unwrap_or_default(),
            stories: count(property.stories),
            rooms: count(property.rooms),
            bathrooms: count(property.bathrooms),
            bedrooms: count(property.bedrooms),
            year_built: count(property.year_built),
            square_footage: count(property.sq_ft),
        };
    }

    pub fn select_contract(&mut self, contract: &Contract) {
        self.data.agreement.selected_contract = contract.id.clone();
    }

    /// Pick a cover letter; its text becomes the editable letter content.
    pub fn select_cover_letter(&mut self, letter: &CoverLetterRecord) {
        self.data.cover_letter = CoverLetter {
            selected_cover_letter: Some(letter.id.clone()),
            content: letter.content.clone(),
        };
    }
}

impl From<FormData> for FormState {
    fn from(data: FormData) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_form_serializes_with_every_field() {
        let value = serde_json::to_value(FormData::default()).unwrap();

        assert_eq!(value["clientInfo"]["id"], json!(""));
        assert_eq!(value["propertyInfo"]["squareFootage"], json!(""));
        assert_eq!(value["coverLetter"]["selectedCoverLetter"], Value::Null);
        assert_eq!(value.as_object().unwrap().len(), 7);
    }

    #[test]
    fn merge_section_keeps_untouched_fields() {
        let mut state = FormState::default();
        state
            .merge_section(Section::Payment, json!({ "price": "500.00" }))
            .unwrap();
        state
            .merge_section(Section::Payment, json!({ "method": "cash" }))
            .unwrap();

        assert_eq!(state.data().payment.price, "500.00");
        assert_eq!(state.data().payment.method, "cash");
        assert_eq!(state.data().payment.discount, "");
    }

    #[test]
    fn merge_section_rejects_unknown_fields() {
        let mut state = FormState::default();
        let err = state
            .merge_section(Section::ClientInfo, json!({ "nickname": "Bob", "name": "Bob" }))
            .unwrap_err();

        assert!(matches!(err, FormError::InvalidPatch { section: Section::ClientInfo, .. }));
        assert_eq!(state.data().client_info.name, "");
    }

    #[test]
    fn merge_section_rejects_non_objects_and_wrong_types() {
        let mut state = FormState::default();

        assert_eq!(
            state.merge_section(Section::Payment, json!("500")),
            Err(FormError::NotAnObject(Section::Payment))
        );
        assert!(state
            .merge_section(Section::Payment, json!({ "price": 500 }))
            .is_err());
    }

    #[test]
    fn section_parses_from_several_spellings() {
        assert_eq!("clientInfo".parse::<Section>().unwrap(), Section::ClientInfo);
        assert_eq!("client_info".parse::<Section>().unwrap(), Section::ClientInfo);
        assert_eq!("cover-letter".parse::<Section>().unwrap(), Section::CoverLetter);
        assert!("review".parse::<Section>().is_err());
    }

    #[test]
    fn set_date_time_truncates_and_ignores_garbage() {
        let mut state = FormState::default();

        assert!(state.set_date_time("2025-04-25T10:00:30"));
        assert_eq!(state.data().general_info.date_time, "2025-04-25T10:00");

        assert!(!state.set_date_time("next tuesday"));
        assert_eq!(state.data().general_info.date_time, "2025-04-25T10:00");

        assert!(state.set_date_time(""));
        assert_eq!(state.data().general_info.date_time, "");
    }

    #[test]
    fn set_date_time_converts_offsets_to_utc() {
        let mut state = FormState::default();

        assert!(state.set_date_time("2025-04-26T16:00:00+02:00"));
        assert_eq!(state.data().general_info.date_time, "2025-04-26T14:00");

        let derived = crate::payload::derive_payload(state.data(), crate::payload::Stage::Draft);
        assert_eq!(
            derived.payload.inspection_date.map(|d| d.to_rfc3339()),
            Some("2025-04-26T14:00:00+00:00".to_string())
        );
    }

    #[test]
    fn catalog_selections_fill_their_sections() {
        let now = chrono::Utc::now();
        let property = Property {
            id: "p1".into(),
            name: "Maple Street House".into(),
            address: None,
            city: None,
            province: None,
            zip_code: None,
            country: None,
            building_type: Some("Detached".into()),
            dwelling: Some("Single".into()),
            stories: Some(2),
            rooms: None,
            bedrooms: Some(3),
            bathrooms: Some(2),
            year_built: Some(1987),
            sq_ft: Some(1850),
            contact_id: Some("1".into()),
            created_at: now,
            updated_at: now,
        };
        let letter = CoverLetterRecord {
            id: "cl1".into(),
            title: "Standard".into(),
            content: "Dear client".into(),
            description: None,
            is_template: true,
            tags: Vec::new(),
            status: Default::default(),
            created_at: now,
            updated_at: now,
        };

        let mut state = FormState::default();
        state.select_property(&property);
        state.select_cover_letter(&letter);

        let form = state.data();
        assert_eq!(form.property_info.building_type, "Detached");
        assert_eq!(form.property_info.square_footage, "1850");
        assert_eq!(form.property_info.rooms, "");
        assert_eq!(form.cover_letter.selected_cover_letter.as_deref(), Some("cl1"));
        assert_eq!(form.cover_letter.content, "Dear client");
    }

    #[test]
    fn payment_summary_treats_blanks_as_zero() {
        let payment = Payment {
            price: "500.00".into(),
            discount: "".into(),
            ..Default::default()
        };
        assert_eq!(payment.summary().total, 500.0);

        let payment = Payment {
            price: "350".into(),
            discount: "50.5".into(),
            ..Default::default()
        };
        assert_eq!(payment.summary().total, 299.5);
    }
}
