//! In-process catalog used for dry runs and tests.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::catalog::{
    CatalogApi, CatalogError, Dataset, DatasetPayload, NewOrganization, Organization, Resource,
    ResourcePayload,
};
use crate::hash::hash_file;

/// Number of write calls received, per action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub organization_create: usize,
    pub package_create: usize,
    pub package_update: usize,
    pub resource_create: usize,
    pub resource_update: usize,
    pub uploads: usize,
}

impl CallCounts {
    /// Create and update calls combined.
    pub fn writes(&self) -> usize {
        self.organization_create
            + self.package_create
            + self.package_update
            + self.resource_create
            + self.resource_update
    }
}

#[derive(Debug, Default)]
struct State {
    organizations: BTreeMap<String, Organization>,
    datasets: BTreeMap<String, Dataset>,
    next_id: u64,
    counts: CallCounts,
    /// action → errors handed out before the call is served normally
    failures: HashMap<String, Vec<CatalogError>>,
    /// dataset slug → owner that wins the race on create
    races: HashMap<String, String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn injected(&mut self, action: &str) -> Result<(), CatalogError> {
        match self.failures.get_mut(action) {
            Some(queue) if !queue.is_empty() => Err(queue.remove(0)),
            _ => Ok(()),
        }
    }

    fn dataset_by_id_mut(&mut self, id: &str) -> Option<&mut Dataset> {
        self.datasets.values_mut().find(|d| d.id == id)
    }
}

/// A catalog kept in memory. Uploaded files are hashed, not stored.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<State>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn counts(&self) -> CallCounts {
        self.lock().counts.clone()
    }

    pub fn reset_counts(&self) {
        self.lock().counts = CallCounts::default();
    }

    /// Makes the next `errors.len()` calls of `action` fail, in order.
    pub fn fail_next(&self, action: &str, errors: Vec<CatalogError>) {
        self.lock()
            .failures
            .entry(action.to_string())
            .or_default()
            .extend(errors);
    }

    /// The next create of `slug` finds it was just created by someone else
    /// under `owner_org`.
    pub fn simulate_create_race(&self, slug: &str, owner_org: &str) {
        self.lock()
            .races
            .insert(slug.to_string(), owner_org.to_string());
    }

    /// Seeds an organization, returning its id.
    pub fn insert_organization(&self, name: &str) -> String {
        let mut state = self.lock();
        let id = state.next_id("org");
        state.organizations.insert(
            name.to_string(),
            Organization {
                id: id.clone(),
                name: name.to_string(),
                title: name.to_string(),
                description: String::new(),
            },
        );
        id
    }

    /// Seeds a bare dataset owned by `owner_org`, returning its id.
    pub fn insert_dataset(&self, name: &str, owner_org: &str) -> String {
        let mut state = self.lock();
        let id = state.next_id("dataset");
        state.datasets.insert(
            name.to_string(),
            Dataset {
                id: id.clone(),
                name: name.to_string(),
                title: Some(name.to_string()),
                notes: None,
                owner_org: Some(owner_org.to_string()),
                resources: Vec::new(),
                extras: Default::default(),
            },
        );
        id
    }

    pub fn organizations(&self) -> Vec<Organization> {
        self.lock().organizations.values().cloned().collect()
    }

    pub fn datasets(&self) -> Vec<Dataset> {
        self.lock().datasets.values().cloned().collect()
    }

    pub fn dataset(&self, name: &str) -> Option<Dataset> {
        self.lock().datasets.get(name).cloned()
    }
}

fn upload_hash(upload: &Path) -> Result<String, CatalogError> {
    hash_file(upload).map_err(|e| CatalogError::Upload {
        path: upload.to_path_buf(),
        message: e.to_string(),
    })
}

fn apply_payload(dataset: &mut Dataset, payload: &DatasetPayload) {
    dataset.title = Some(payload.title.clone());
    dataset.notes = Some(payload.notes.clone());
    dataset.owner_org = Some(payload.owner_org.clone());
    for (key, value) in &payload.extras {
        dataset.extras.insert(key.clone(), value.clone());
    }
}

impl CatalogApi for MemoryCatalog {
    fn status(&self) -> Result<(), CatalogError> {
        self.lock().injected("status")
    }

    fn organization_show(&self, name: &str) -> Result<Option<Organization>, CatalogError> {
        let mut state = self.lock();
        state.injected("organization_show")?;
        Ok(state.organizations.get(name).cloned())
    }

    fn organization_create(&self, org: &NewOrganization) -> Result<Organization, CatalogError> {
        let mut state = self.lock();
        state.injected("organization_create")?;
        state.counts.organization_create += 1;

        if state.organizations.contains_key(&org.name) {
            return Err(CatalogError::Validation(format!(
                "Group name already exists in database: {}",
                org.name
            )));
        }

        let created = Organization {
            id: state.next_id("org"),
            name: org.name.clone(),
            title: org.title.clone(),
            description: org.description.clone(),
        };
        state
            .organizations
            .insert(org.name.clone(), created.clone());
        Ok(created)
    }

    fn package_show(&self, name: &str) -> Result<Option<Dataset>, CatalogError> {
        let mut state = self.lock();
        state.injected("package_show")?;
        Ok(state
            .datasets
            .get(name)
            .or_else(|| state.datasets.values().find(|d| d.id == name))
            .cloned())
    }

    fn package_create(&self, payload: &DatasetPayload) -> Result<Dataset, CatalogError> {
        let mut state = self.lock();
        state.injected("package_create")?;
        state.counts.package_create += 1;

        if let Some(winner) = state.races.remove(&payload.name) {
            let id = state.next_id("dataset");
            state.datasets.insert(
                payload.name.clone(),
                Dataset {
                    id,
                    name: payload.name.clone(),
                    title: Some(payload.title.clone()),
                    notes: Some(payload.notes.clone()),
                    owner_org: Some(winner),
                    resources: Vec::new(),
                    extras: payload.extras.clone(),
                },
            );
        }

        if state.datasets.contains_key(&payload.name) {
            return Err(CatalogError::Validation(format!(
                "That URL is already in use: {}",
                payload.name
            )));
        }

        let mut dataset = Dataset {
            id: state.next_id("dataset"),
            name: payload.name.clone(),
            title: None,
            notes: None,
            owner_org: None,
            resources: Vec::new(),
            extras: Default::default(),
        };
        apply_payload(&mut dataset, payload);
        state.datasets.insert(payload.name.clone(), dataset.clone());
        Ok(dataset)
    }

    fn package_update(&self, id: &str, payload: &DatasetPayload) -> Result<Dataset, CatalogError> {
        let mut state = self.lock();
        state.injected("package_update")?;
        state.counts.package_update += 1;

        let dataset = state
            .dataset_by_id_mut(id)
            .ok_or_else(|| CatalogError::NotFound(format!("dataset {}", id)))?;
        apply_payload(dataset, payload);
        Ok(dataset.clone())
    }

    fn resource_find(&self, dataset_id: &str, name: &str) -> Result<Option<Resource>, CatalogError> {
        let mut state = self.lock();
        state.injected("resource_find")?;
        let dataset = state
            .dataset_by_id_mut(dataset_id)
            .ok_or_else(|| CatalogError::NotFound(format!("dataset {}", dataset_id)))?;
        Ok(dataset.resources.iter().find(|r| r.name == name).cloned())
    }

    fn resource_create(
        &self,
        dataset_id: &str,
        payload: &ResourcePayload,
        upload: &Path,
    ) -> Result<Resource, CatalogError> {
        let mut state = self.lock();
        state.injected("resource_create")?;
        state.counts.resource_create += 1;
        // Read like a real upload would, so a vanished file fails here
        upload_hash(upload)?;
        state.counts.uploads += 1;

        let id = state.next_id("resource");
        let dataset = state
            .dataset_by_id_mut(dataset_id)
            .ok_or_else(|| CatalogError::NotFound(format!("dataset {}", dataset_id)))?;

        if dataset.resources.iter().any(|r| r.name == payload.name) {
            return Err(CatalogError::Validation(format!(
                "Resource name already used in dataset: {}",
                payload.name
            )));
        }

        let resource = Resource {
            id,
            package_id: Some(dataset_id.to_string()),
            name: payload.name.clone(),
            fields: payload.fields.clone(),
        };
        dataset.resources.push(resource.clone());
        Ok(resource)
    }

    fn resource_update(
        &self,
        resource_id: &str,
        payload: &ResourcePayload,
        upload: &Path,
    ) -> Result<Resource, CatalogError> {
        let mut state = self.lock();
        state.injected("resource_update")?;
        state.counts.resource_update += 1;
        upload_hash(upload)?;
        state.counts.uploads += 1;

        let resource = state
            .datasets
            .values_mut()
            .flat_map(|d| d.resources.iter_mut())
            .find(|r| r.id == resource_id)
            .ok_or_else(|| CatalogError::NotFound(format!("resource {}", resource_id)))?;

        resource.name = payload.name.clone();
        for (key, value) in &payload.fields {
            resource.fields.insert(key.clone(), value.clone());
        }
        Ok(resource.clone())
    }
}
