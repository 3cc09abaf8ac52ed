//! Remote catalog model, backends and the synchronization engine.

pub mod client;
pub mod error;
pub mod memory;
pub mod retry;
pub mod sync;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extractor::Fields;

pub use client::CkanClient;
pub use error::CatalogError;
pub use memory::{CallCounts, MemoryCatalog};
pub use retry::RetryPolicy;
pub use sync::{CatalogSync, ResourceOutcome, SyncStats};

/// Resource field holding the SHA-256 of the uploaded bytes.
pub const HASH_FIELD: &str = "file_hash";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrganization {
    pub name: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub owner_org: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Every other field the catalog returned.
    #[serde(flatten)]
    pub extras: Fields,
}

/// What we want a dataset to look like.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetPayload {
    pub name: String,
    pub title: String,
    pub notes: String,
    pub owner_org: String,
    #[serde(flatten)]
    pub extras: Fields,
}

impl DatasetPayload {
    /// True when `existing` lacks or disagrees with any field of this payload.
    pub fn differs_from(&self, existing: &Dataset) -> bool {
        existing.title.as_deref() != Some(self.title.as_str())
            || existing.notes.as_deref() != Some(self.notes.as_str())
            || existing.owner_org.as_deref() != Some(self.owner_org.as_str())
            || self
                .extras
                .iter()
                .any(|(key, value)| !values_match(value, existing.extras.get(key)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub package_id: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Resource {
    pub fn hash(&self) -> Option<&str> {
        self.fields.get(HASH_FIELD).and_then(Value::as_str)
    }
}

/// Resource metadata to publish. `fields` carries everything except the
/// name, the content hash included.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePayload {
    pub name: String,
    pub fields: Fields,
}

impl ResourcePayload {
    pub fn new(name: impl Into<String>, fields: Fields) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn hash(&self) -> Option<&str> {
        self.fields.get(HASH_FIELD).and_then(Value::as_str)
    }

    /// Names of mapped fields whose remote value differs, hash excluded.
    pub fn changed_fields(&self, existing: &Resource) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(key, _)| key.as_str() != HASH_FIELD)
            .filter(|(key, value)| !values_match(value, existing.fields.get(key.as_str())))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// Catalogs store non-string extras as text, so `42` and `"42"` are equal.
fn values_match(local: &Value, remote: Option<&Value>) -> bool {
    match remote {
        None => local.is_null(),
        Some(remote) if remote == local => true,
        Some(Value::String(remote)) => !local.is_string() && *remote == local.to_string(),
        Some(_) => false,
    }
}

/// Operations the synchronization engine needs from a catalog.
///
/// `*_show` and [`CatalogApi::resource_find`] return `Ok(None)` for an
/// entity that does not exist.
pub trait CatalogApi {
    /// Connectivity check.
    fn status(&self) -> Result<(), CatalogError>;

    fn organization_show(&self, name: &str) -> Result<Option<Organization>, CatalogError>;

    fn organization_create(&self, org: &NewOrganization) -> Result<Organization, CatalogError>;

    fn package_show(&self, name: &str) -> Result<Option<Dataset>, CatalogError>;

    fn package_create(&self, payload: &DatasetPayload) -> Result<Dataset, CatalogError>;

    fn package_update(&self, id: &str, payload: &DatasetPayload)
        -> Result<Dataset, CatalogError>;

    fn resource_find(&self, dataset_id: &str, name: &str)
        -> Result<Option<Resource>, CatalogError>;

    fn resource_create(
        &self,
        dataset_id: &str,
        payload: &ResourcePayload,
        upload: &Path,
    ) -> Result<Resource, CatalogError>;

    fn resource_update(
        &self,
        resource_id: &str,
        payload: &ResourcePayload,
        upload: &Path,
    ) -> Result<Resource, CatalogError>;
}

macro_rules! forward_catalog_api {
    ($($target:ty),*) => {$(
        impl<T: CatalogApi + ?Sized> CatalogApi for $target {
            fn status(&self) -> Result<(), CatalogError> {
                (**self).status()
            }
            fn organization_show(&self, name: &str) -> Result<Option<Organization>, CatalogError> {
                (**self).organization_show(name)
            }
            fn organization_create(&self, org: &NewOrganization) -> Result<Organization, CatalogError> {
                (**self).organization_create(org)
            }
            fn package_show(&self, name: &str) -> Result<Option<Dataset>, CatalogError> {
                (**self).package_show(name)
            }
            fn package_create(&self, payload: &DatasetPayload) -> Result<Dataset, CatalogError> {
                (**self).package_create(payload)
            }
            fn package_update(&self, id: &str, payload: &DatasetPayload) -> Result<Dataset, CatalogError> {
                (**self).package_update(id, payload)
            }
            fn resource_find(&self, dataset_id: &str, name: &str) -> Result<Option<Resource>, CatalogError> {
                (**self).resource_find(dataset_id, name)
            }
            fn resource_create(&self, dataset_id: &str, payload: &ResourcePayload, upload: &Path) -> Result<Resource, CatalogError> {
                (**self).resource_create(dataset_id, payload, upload)
            }
            fn resource_update(&self, resource_id: &str, payload: &ResourcePayload, upload: &Path) -> Result<Resource, CatalogError> {
                (**self).resource_update(resource_id, payload, upload)
            }
        }
    )*};
}

forward_catalog_api!(&T, Box<T>, std::sync::Arc<T>);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(fields: Value) -> Resource {
        Resource {
            id: "r1".into(),
            package_id: Some("d1".into()),
            name: "report.csv".into(),
            fields: fields.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_changed_fields_ignores_hash() {
        let existing = resource(json!({ "format": "CSV", "file_hash": "old" }));
        let payload = ResourcePayload::new(
            "report.csv",
            json!({ "format": "CSV", "file_hash": "new" })
                .as_object()
                .unwrap()
                .clone(),
        );

        assert!(payload.changed_fields(&existing).is_empty());
        assert_eq!(payload.hash(), Some("new"));
        assert_eq!(existing.hash(), Some("old"));
    }

    #[test]
    fn test_changed_fields_detects_metadata_change() {
        let existing = resource(json!({ "format": "CSV", "page_count": "3" }));
        let payload = ResourcePayload::new(
            "report.csv",
            json!({ "format": "TSV", "page_count": 3, "title": "Report" })
                .as_object()
                .unwrap()
                .clone(),
        );

        assert_eq!(payload.changed_fields(&existing), vec!["format", "title"]);
    }

    #[test]
    fn test_dataset_differs() {
        let payload = DatasetPayload {
            name: "reports".into(),
            title: "reports".into(),
            notes: "notes".into(),
            owner_org: "org-1".into(),
            extras: json!({ "source": "harvest" }).as_object().unwrap().clone(),
        };
        let mut existing = Dataset {
            id: "d1".into(),
            name: "reports".into(),
            title: Some("reports".into()),
            notes: Some("notes".into()),
            owner_org: Some("org-1".into()),
            resources: Vec::new(),
            extras: payload.extras.clone(),
        };
        assert!(!payload.differs_from(&existing));

        existing.notes = Some("edited by hand".into());
        assert!(payload.differs_from(&existing));
    }

    #[test]
    fn test_dataset_deserializes_ckan_shape() {
        let dataset: Dataset = serde_json::from_value(json!({
            "id": "abc",
            "name": "reports",
            "title": "Reports",
            "notes": null,
            "owner_org": "org-1",
            "num_resources": 1,
            "resources": [{ "id": "r1", "name": "a.pdf", "package_id": "abc", "file_hash": "h" }]
        }))
        .unwrap();

        assert_eq!(dataset.notes, None);
        assert_eq!(dataset.resources[0].hash(), Some("h"));
        assert_eq!(dataset.extras["num_resources"], 1);
    }
}
