use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    Client,
    Agent,
    Other,
}

/// An address-book entry the client step can pick from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub contact_type: ContactType,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query)
            || self
                .email
                .as_deref()
                .is_some_and(|email| email.to_lowercase().contains(&query))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
    #[serde(rename = "type")]
    pub contact_type: ContactType,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl NewContact {
    pub fn new(name: impl Into<String>, contact_type: ContactType) -> Self {
        Self {
            name: name.into(),
            contact_type,
            company: None,
            email: None,
            phone: None,
            notes: None,
            address: None,
            city: None,
            province: None,
            zip_code: None,
            country: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_zip_code(mut self, zip_code: impl Into<String>) -> Self {
        self.zip_code = Some(zip_code.into());
        self
    }
}

/// Partial update: only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub contact_type: Option<ContactType>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

/// Contact listing collaborator used to populate the client step.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn list(&self) -> Result<Vec<Contact>, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<Contact>, StoreError>;
    async fn create(&self, contact: NewContact) -> Result<Contact, StoreError>;
    async fn update(&self, id: &str, update: ContactUpdate) -> Result<Contact, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Contacts of type client whose name or email contains `query`,
    /// ignoring case. An empty query returns every client.
    async fn clients(&self, query: &str) -> Result<Vec<Contact>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|c| c.contact_type == ContactType::Client && c.matches(query))
            .collect())
    }
}

/// In-memory implementation of ContactDirectory
pub struct InMemoryContactDirectory {
    contacts: Arc<DashMap<String, Contact>>,
}

impl InMemoryContactDirectory {
    pub fn new() -> Self {
        Self {
            contacts: Arc::new(DashMap::new()),
        }
    }

    /// Directory holding one client, one agent and one other contact.
    pub fn with_sample_contacts() -> Self {
        let directory = Self::new();
        let samples = [
            (
                "1",
                NewContact::new("John Smith", ContactType::Client)
                    .with_email("john.smith@email.com")
                    .with_phone("11999999991")
                    .with_zip_code("11111-111"),
            ),
            (
                "2",
                NewContact::new("Mary Oliver (Agent)", ContactType::Agent)
                    .with_email("mary.oliver@email.com")
                    .with_phone("11888888882")
                    .with_zip_code("22222-222"),
            ),
            (
                "3",
                NewContact::new("Other Contact", ContactType::Other)
                    .with_email("other@email.com")
                    .with_phone("11777777773")
                    .with_zip_code("33333-333"),
            ),
        ];
        for (id, contact) in samples {
            directory.insert(id.to_string(), contact);
        }
        directory
    }

    fn insert(&self, id: String, contact: NewContact) -> Contact {
        let now = Utc::now();
        let contact = Contact {
            id: id.clone(),
            name: contact.name,
            contact_type: contact.contact_type,
            company: contact.company,
            email: contact.email,
            phone: contact.phone,
            notes: contact.notes,
            address: contact.address,
            city: contact.city,
            province: contact.province,
            zip_code: contact.zip_code,
            country: contact.country,
            created_at: now,
            updated_at: now,
        };
        self.contacts.insert(id, contact.clone());
        contact
    }
}

impl Default for InMemoryContactDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContactDirectory for InMemoryContactDirectory {
    async fn list(&self) -> Result<Vec<Contact>, StoreError> {
        let mut contacts: Vec<Contact> = self.contacts.iter().map(|e| e.value().clone()).collect();
        contacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(contacts)
    }

    async fn get(&self, id: &str) -> Result<Option<Contact>, StoreError> {
        Ok(self.contacts.get(id).map(|entry| entry.clone()))
    }

    async fn create(&self, contact: NewContact) -> Result<Contact, StoreError> {
        Ok(self.insert(Uuid::new_v4().to_string(), contact))
    }

    async fn update(&self, id: &str, update: ContactUpdate) -> Result<Contact, StoreError> {
        let mut entry = self
            .contacts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let contact = entry.value_mut();

        if let Some(name) = update.name {
            contact.name = name;
        }
        if let Some(contact_type) = update.contact_type {
            contact.contact_type = contact_type;
        }
        let optional = [
            (&mut contact.company, update.company),
            (&mut contact.email, update.email),
            (&mut contact.phone, update.phone),
            (&mut contact.notes, update.notes),
            (&mut contact.address, update.address),
            (&mut contact.city, update.city),
            (&mut contact.province, update.province),
            (&mut contact.zip_code, update.zip_code),
            (&mut contact.country, update.country),
        ];
        for (slot, value) in optional {
            if value.is_some() {
                *slot = value;
            }
        }
        contact.updated_at = Utc::now();
        Ok(contact.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.contacts.remove(id);
        Ok(())
    }
}
