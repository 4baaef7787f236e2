//! Listing collaborators behind the property, agreement and cover-letter
//! steps.
//!
//! Each step view picks one record from its collaborator and copies it into
//! the form (see [`FormState`](crate::form::FormState)). Updates replace the
//! editable fields of a record wholesale; id and `created_at` never change.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::StoreError;

fn contains_ignore_case(haystack: &str, query: &str) -> bool {
    haystack.to_lowercase().contains(query)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub building_type: Option<String>,
    pub dwelling: Option<String>,
    pub stories: Option<i32>,
    pub rooms: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub year_built: Option<i32>,
    pub sq_ft: Option<i32>,
    /// Contact (usually the client) the property belongs to.
    pub contact_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// Name or address contains `query`, ignoring case.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || contains_ignore_case(&self.name, &query)
            || self
                .address
                .as_deref()
                .is_some_and(|address| contains_ignore_case(address, &query))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewProperty {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub building_type: Option<String>,
    pub dwelling: Option<String>,
    pub stories: Option<i32>,
    pub rooms: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub year_built: Option<i32>,
    pub sq_ft: Option<i32>,
    pub contact_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    #[default]
    Draft,
    Sent,
    Signed,
    Expired,
}

/// Inspection agreement offered on the agreement step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,
    pub title: String,
    pub content: String,
    pub description: Option<String>,
    pub is_template: bool,
    pub tags: Vec<String>,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewContract {
    pub title: String,
    pub content: String,
    pub description: Option<String>,
    pub is_template: bool,
    pub tags: Vec<String>,
    pub status: ContractStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverLetterStatus {
    #[default]
    Draft,
    Sent,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverLetter {
    pub id: String,
    pub title: String,
    pub content: String,
    pub description: Option<String>,
    pub is_template: bool,
    pub tags: Vec<String>,
    pub status: CoverLetterStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCoverLetter {
    pub title: String,
    pub content: String,
    pub description: Option<String>,
    pub is_template: bool,
    pub tags: Vec<String>,
    pub status: CoverLetterStatus,
}

/// A record an [`InMemoryCatalog`] can hold.
pub trait CatalogEntry: Clone + Send + Sync + 'static {
    /// Editable fields, as sent on create and update.
    type Draft: Send + 'static;

    fn build(id: String, draft: Self::Draft, now: DateTime<Utc>) -> Self;
    fn revise(&mut self, draft: Self::Draft, now: DateTime<Utc>);
    fn created_at(&self) -> DateTime<Utc>;
}

impl CatalogEntry for Property {
    type Draft = NewProperty;

    fn build(id: String, draft: NewProperty, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            address: draft.address,
            city: draft.city,
            province: draft.province,
            zip_code: draft.zip_code,
            country: draft.country,
            building_type: draft.building_type,
            dwelling: draft.dwelling,
            stories: draft.stories,
            rooms: draft.rooms,
            bedrooms: draft.bedrooms,
            bathrooms: draft.bathrooms,
            year_built: draft.year_built,
            sq_ft: draft.sq_ft,
            contact_id: draft.contact_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: NewProperty, now: DateTime<Utc>) {
        *self = Self {
            id: std::mem::take(&mut self.id),
            created_at: self.created_at,
            ..Self::build(String::new(), draft, now)
        };
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl CatalogEntry for Contract {
    type Draft = NewContract;

    fn build(id: String, draft: NewContract, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            content: draft.content,
            description: draft.description,
            is_template: draft.is_template,
            tags: draft.tags,
            status: draft.status,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: NewContract, now: DateTime<Utc>) {
        *self = Self {
            id: std::mem::take(&mut self.id),
            created_at: self.created_at,
            ..Self::build(String::new(), draft, now)
        };
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl CatalogEntry for CoverLetter {
    type Draft = NewCoverLetter;

    fn build(id: String, draft: NewCoverLetter, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            content: draft.content,
            description: draft.description,
            is_template: draft.is_template,
            tags: draft.tags,
            status: draft.status,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: NewCoverLetter, now: DateTime<Utc>) {
        *self = Self {
            id: std::mem::take(&mut self.id),
            created_at: self.created_at,
            ..Self::build(String::new(), draft, now)
        };
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Property listing collaborator used by the property step.
#[async_trait]
pub trait PropertyDirectory: Send + Sync {
    async fn list(&self) -> Result<Vec<Property>, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<Property>, StoreError>;
    async fn create(&self, property: NewProperty) -> Result<Property, StoreError>;
    async fn update(&self, id: &str, property: NewProperty) -> Result<Property, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Properties linked to `contact_id` whose name or address contains
    /// `query`.
    async fn list_by_contact(
        &self,
        contact_id: &str,
        query: &str,
    ) -> Result<Vec<Property>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|p| p.contact_id.as_deref() == Some(contact_id) && p.matches(query))
            .collect())
    }
}

/// Contract listing collaborator used by the agreement step.
#[async_trait]
pub trait ContractLibrary: Send + Sync {
    async fn list(&self) -> Result<Vec<Contract>, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<Contract>, StoreError>;
    async fn create(&self, contract: NewContract) -> Result<Contract, StoreError>;
    async fn update(&self, id: &str, contract: NewContract) -> Result<Contract, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Contracts whose title or content contains `query`, ignoring case.
    async fn search(&self, query: &str) -> Result<Vec<Contract>, StoreError> {
        let query = query.trim().to_lowercase();
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|c| contains_ignore_case(&c.title, &query) || contains_ignore_case(&c.content, &query))
            .collect())
    }
}

/// Cover-letter listing collaborator used by the cover-letter step.
#[async_trait]
pub trait CoverLetterLibrary: Send + Sync {
    async fn list(&self) -> Result<Vec<CoverLetter>, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<CoverLetter>, StoreError>;
    async fn create(&self, letter: NewCoverLetter) -> Result<CoverLetter, StoreError>;
    async fn update(&self, id: &str, letter: NewCoverLetter) -> Result<CoverLetter, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Letters whose title or content contains `query`, ignoring case.
    async fn search(&self, query: &str) -> Result<Vec<CoverLetter>, StoreError> {
        let query = query.trim().to_lowercase();
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|l| contains_ignore_case(&l.title, &query) || contains_ignore_case(&l.content, &query))
            .collect())
    }
}

/// DashMap-backed store for any [`CatalogEntry`], newest first.
pub struct InMemoryCatalog<T> {
    entries: Arc<DashMap<String, T>>,
}

impl<T: CatalogEntry> InMemoryCatalog<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&self, id: String, draft: T::Draft) -> T {
        let entry = T::build(id.clone(), draft, Utc::now());
        self.entries.insert(id, entry.clone());
        entry
    }

    fn all(&self) -> Vec<T> {
        let mut entries: Vec<T> = self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| std::cmp::Reverse(e.created_at()));
        entries
    }

    fn find(&self, id: &str) -> Option<T> {
        self.entries.get(id).map(|entry| entry.clone())
    }

    fn revise(&self, id: &str, draft: T::Draft) -> Result<T, StoreError> {
        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.value_mut().revise(draft, Utc::now());
        Ok(entry.clone())
    }

    fn remove(&self, id: &str) {
        self.entries.remove(id);
    }
}

impl<T: CatalogEntry> Default for InMemoryCatalog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog<Property> {
    /// Two houses owned by sample contact "1".
    pub fn with_sample_properties() -> Self {
        let catalog = Self::new();
        catalog.insert(
            "1".into(),
            NewProperty {
                name: "Maple Street House".into(),
                address: Some("12 Maple Street".into()),
                city: Some("Toronto".into()),
                province: Some("ON".into()),
                building_type: Some("Detached".into()),
                dwelling: Some("Single".into()),
                stories: Some(2),
                bedrooms: Some(3),
                bathrooms: Some(2),
                year_built: Some(1987),
                sq_ft: Some(1850),
                contact_id: Some("1".into()),
                ..Default::default()
            },
        );
        catalog.insert(
            "2".into(),
            NewProperty {
                name: "Lakeview Condo".into(),
                address: Some("400 Lakeshore Blvd, Unit 1204".into()),
                city: Some("Toronto".into()),
                province: Some("ON".into()),
                building_type: Some("Condo - high rise".into()),
                dwelling: Some("Multi-unit".into()),
                contact_id: Some("1".into()),
                ..Default::default()
            },
        );
        catalog
    }
}

impl InMemoryCatalog<Contract> {
    pub fn with_sample_contracts() -> Self {
        let catalog = Self::new();
        let samples = [
            ("1", "Standard Inspection Agreement", "Template agreement", true, ContractStatus::Draft),
            ("2", "Client A Agreement", "Agreement for client A", false, ContractStatus::Signed),
            ("3", "Client B Agreement", "Agreement for client B", false, ContractStatus::Sent),
        ];
        for (id, title, content, is_template, status) in samples {
            catalog.insert(
                id.into(),
                NewContract {
                    title: title.into(),
                    content: content.into(),
                    is_template,
                    status,
                    ..Default::default()
                },
            );
        }
        catalog
    }
}

impl InMemoryCatalog<CoverLetter> {
    pub fn with_sample_cover_letters() -> Self {
        let catalog = Self::new();
        catalog.insert(
            "1".into(),
            NewCoverLetter {
                title: "Standard Cover Letter".into(),
                content: "Thank you for choosing us for your home inspection.".into(),
                is_template: true,
                ..Default::default()
            },
        );
        catalog
    }
}

#[async_trait]
impl PropertyDirectory for InMemoryCatalog<Property> {
    async fn list(&self) -> Result<Vec<Property>, StoreError> {
        Ok(self.all())
    }

    async fn get(&self, id: &str) -> Result<Option<Property>, StoreError> {
        Ok(self.find(id))
    }

    async fn create(&self, property: NewProperty) -> Result<Property, StoreError> {
        Ok(self.insert(Uuid::new_v4().to_string(), property))
    }

    async fn update(&self, id: &str, property: NewProperty) -> Result<Property, StoreError> {
        self.revise(id, property)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.remove(id);
        Ok(())
    }
}

#[async_trait]
impl ContractLibrary for InMemoryCatalog<Contract> {
    async fn list(&self) -> Result<Vec<Contract>, StoreError> {
        Ok(self.all())
    }

    async fn get(&self, id: &str) -> Result<Option<Contract>, StoreError> {
        Ok(self.find(id))
    }

    async fn create(&self, contract: NewContract) -> Result<Contract, StoreError> {
        Ok(self.insert(Uuid::new_v4().to_string(), contract))
    }

    async fn update(&self, id: &str, contract: NewContract) -> Result<Contract, StoreError> {
        self.revise(id, contract)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.remove(id);
        Ok(())
    }
}

#[async_trait]
impl CoverLetterLibrary for InMemoryCatalog<CoverLetter> {
    async fn list(&self) -> Result<Vec<CoverLetter>, StoreError> {
        Ok(self.all())
    }

    async fn get(&self, id: &str) -> Result<Option<CoverLetter>, StoreError> {
        Ok(self.find(id))
    }

    async fn create(&self, letter: NewCoverLetter) -> Result<CoverLetter, StoreError> {
        Ok(self.insert(Uuid::new_v4().to_string(), letter))
    }

    async fn update(&self, id: &str, letter: NewCoverLetter) -> Result<CoverLetter, StoreError> {
        self.revise(id, letter)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn properties_are_listed_per_contact() {
        let properties = InMemoryCatalog::<Property>::with_sample_properties();
        properties
            .create(NewProperty {
                name: "Somebody Else's Cottage".into(),
                contact_id: Some("9".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(properties.list_by_contact("1", "").await.unwrap().len(), 2);
        let found = properties.list_by_contact("1", "lakeshore").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "2");
        assert!(properties.list_by_contact("2", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_fields_but_keeps_identity() {
        let contracts = InMemoryCatalog::<Contract>::with_sample_contracts();
        let before = contracts.get("2").await.unwrap().unwrap();

        let after = contracts
            .update(
                "2",
                NewContract {
                    title: "Client A Agreement v2".into(),
                    content: "Revised".into(),
                    status: ContractStatus::Expired,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(after.id, "2");
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.status, ContractStatus::Expired);
        assert!(!after.is_template);
        assert_eq!(
            contracts.update("missing", NewContract::default()).await,
            Err(StoreError::NotFound("missing".into()))
        );
    }

    #[tokio::test]
    async fn search_matches_title_or_content() {
        let letters = InMemoryCatalog::<CoverLetter>::with_sample_cover_letters();
        assert_eq!(letters.search("HOME INSPECTION").await.unwrap().len(), 1);
        assert_eq!(letters.search("standard").await.unwrap().len(), 1);
        assert!(letters.search("invoice").await.unwrap().is_empty());

        letters.delete("1").await.unwrap();
        assert!(letters.is_empty());
    }
}
