//! Reconciles local items with the remote catalog.
//!
//! Every lookup result is cached for the lifetime of one [`CatalogSync`], so
//! repeated references to the same organization or dataset cost one round
//! trip per run. Failures are cached too: an organization that could not be
//! resolved is not retried for every item that depends on it.
//!
//! Only [`CatalogError::is_fatal`] errors leave this module as `Err`; every
//! other failure is logged, counted and reported as `Ok(None)` so the caller
//! can skip the dependent items and carry on.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, info_span, warn};

use crate::catalog::{
    CatalogApi, CatalogError, Dataset, DatasetPayload, NewOrganization, Resource,
    ResourcePayload, RetryPolicy, HASH_FIELD,
};

/// Counters for everything the engine did in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub organizations_created: usize,
    pub datasets_created: usize,
    pub datasets_updated: usize,
    pub datasets_unchanged: usize,
    pub dataset_conflicts: usize,
    pub resources_created: usize,
    pub resources_updated: usize,
    pub resources_unchanged: usize,
    pub resources_skipped: usize,
    /// Organizations, datasets and resources that could not be synchronized.
    pub failures: usize,
}

impl SyncStats {
    pub fn writes(&self) -> usize {
        self.organizations_created
            + self.datasets_created
            + self.datasets_updated
            + self.resources_created
            + self.resources_updated
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceOutcome {
    Created(Resource),
    Updated(Resource),
    Unchanged(Resource),
    /// The file was already handled earlier in this run.
    Skipped,
}

#[derive(Debug, Clone)]
struct CachedDataset {
    id: String,
    owner_org: String,
}

pub struct CatalogSync<C> {
    catalog: C,
    retry: RetryPolicy,
    /// slug → id, `None` when it could not be resolved
    organizations: HashMap<String, Option<String>>,
    datasets: HashMap<String, Option<CachedDataset>>,
    uploaded: HashSet<PathBuf>,
    stats: SyncStats,
}

impl<C: CatalogApi> CatalogSync<C> {
    pub fn new(catalog: C, retry: RetryPolicy) -> Self {
        Self {
            catalog,
            retry,
            organizations: HashMap::new(),
            datasets: HashMap::new(),
            uploaded: HashSet::new(),
            stats: SyncStats::default(),
        }
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Connectivity check, retried like any other call.
    pub fn check_connection(&self) -> Result<(), CatalogError> {
        self.retry.run("status_show", || self.catalog.status())
    }

    /// Organization id for `slug`, creating the organization when needed.
    pub fn ensure_organization(
        &mut self,
        slug: &str,
        title: &str,
    ) -> Result<Option<String>, CatalogError> {
        if let Some(cached) = self.organizations.get(slug) {
            return Ok(cached.clone());
        }

        let _span = info_span!("ensure_organization", slug).entered();
        let resolved = self.resolve_organization(slug, title);
        let id = self.settle(resolved, "organization", slug)?;
        self.organizations.insert(slug.to_string(), id.clone());
        Ok(id)
    }

    fn resolve_organization(&mut self, slug: &str, title: &str) -> Result<String, CatalogError> {
        let catalog = &self.catalog;
        if let Some(existing) = self
            .retry
            .run("organization_show", || catalog.organization_show(slug))?
        {
            debug!(id = %existing.id, "Organization exists");
            return Ok(existing.id);
        }

        let request = NewOrganization {
            name: slug.to_string(),
            title: title.to_string(),
            description: format!("Organization for data harvested from {}", title),
        };
        let created = self
            .retry
            .run("organization_create", || catalog.organization_create(&request))?;
        self.stats.organizations_created += 1;
        info!(id = %created.id, "Created organization");
        Ok(created.id)
    }

    /// Dataset id for `payload.name`, created or brought up to date.
    ///
    /// A dataset that already exists under another organization is left
    /// untouched and reported unresolved.
    pub fn ensure_dataset(&mut self, payload: &DatasetPayload) -> Result<Option<String>, CatalogError> {
        let slug = payload.name.as_str();
        if let Some(cached) = self.datasets.get(slug) {
            return Ok(match cached {
                Some(dataset) if dataset.owner_org == payload.owner_org => Some(dataset.id.clone()),
                Some(dataset) => {
                    warn!(
                        dataset = slug,
                        owner = %dataset.owner_org,
                        expected = %payload.owner_org,
                        "Dataset belongs to another organization, not reassigning"
                    );
                    None
                }
                None => None,
            });
        }

        let _span = info_span!("ensure_dataset", slug).entered();
        let resolved = self.resolve_dataset(payload);
        let dataset = self.settle(resolved, "dataset", slug)?.flatten();
        self.datasets.insert(slug.to_string(), dataset.clone());
        Ok(dataset.map(|d| d.id))
    }

    /// `Ok(None)` means an ownership conflict.
    fn resolve_dataset(
        &mut self,
        payload: &DatasetPayload,
    ) -> Result<Option<CachedDataset>, CatalogError> {
        let catalog = &self.catalog;
        let slug = payload.name.as_str();

        let existing = self.retry.run("package_show", || catalog.package_show(slug))?;
        if let Some(existing) = existing {
            return self.reconcile_dataset(existing, payload);
        }

        match self.retry.run("package_create", || catalog.package_create(payload)) {
            Ok(created) => {
                self.stats.datasets_created += 1;
                info!(id = %created.id, "Created dataset");
                Ok(Some(CachedDataset {
                    id: created.id,
                    owner_org: payload.owner_org.clone(),
                }))
            }
            Err(CatalogError::Validation(message)) => {
                // Someone may have created it between our lookup and create
                debug!(%message, "Create rejected, checking for a concurrent create");
                match self.retry.run("package_show", || catalog.package_show(slug))? {
                    Some(winner) => {
                        info!(id = %winner.id, "Dataset was created concurrently, using it");
                        self.reconcile_dataset(winner, payload)
                    }
                    None => Err(CatalogError::Validation(message)),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn reconcile_dataset(
        &mut self,
        existing: Dataset,
        payload: &DatasetPayload,
    ) -> Result<Option<CachedDataset>, CatalogError> {
        let owner = existing.owner_org.clone().unwrap_or_default();
        if owner != payload.owner_org {
            warn!(
                id = %existing.id,
                owner = %owner,
                expected = %payload.owner_org,
                "Dataset belongs to another organization, not reassigning"
            );
            self.stats.dataset_conflicts += 1;
            return Ok(None);
        }

        if payload.differs_from(&existing) {
            let catalog = &self.catalog;
            let id = existing.id.as_str();
            self.retry
                .run("package_update", || catalog.package_update(id, payload))?;
            self.stats.datasets_updated += 1;
            info!(id, "Updated dataset");
        } else {
            self.stats.datasets_unchanged += 1;
            debug!(id = %existing.id, "Dataset up to date");
        }

        Ok(Some(CachedDataset {
            id: existing.id,
            owner_org: owner,
        }))
    }

    /// Creates or updates the resource `payload.name` in `dataset_id`,
    /// uploading `file` only when something changed.
    pub fn upsert_resource(
        &mut self,
        dataset_id: &str,
        payload: &ResourcePayload,
        file: &Path,
        hash: &str,
    ) -> Result<Option<ResourceOutcome>, CatalogError> {
        if self.uploaded.contains(file) {
            debug!(resource = %payload.name, "File already handled in this run");
            self.stats.resources_skipped += 1;
            return Ok(Some(ResourceOutcome::Skipped));
        }

        let _span = info_span!("upsert_resource", resource = %payload.name).entered();

        let mut payload = payload.clone();
        payload
            .fields
            .insert(HASH_FIELD.to_string(), Value::String(hash.to_string()));

        let resolved = self.resolve_resource(dataset_id, &payload, file);
        let outcome = self.settle(resolved, "resource", &payload.name)?;
        if outcome.is_some() {
            self.uploaded.insert(file.to_path_buf());
        }
        Ok(outcome)
    }

    fn resolve_resource(
        &mut self,
        dataset_id: &str,
        payload: &ResourcePayload,
        file: &Path,
    ) -> Result<ResourceOutcome, CatalogError> {
        let catalog = &self.catalog;
        let name = payload.name.as_str();

        let existing = self
            .retry
            .run("resource_find", || catalog.resource_find(dataset_id, name))?;

        let Some(existing) = existing else {
            let created = self.retry.run("resource_create", || {
                catalog.resource_create(dataset_id, payload, file)
            })?;
            self.stats.resources_created += 1;
            info!(id = %created.id, "Created resource");
            return Ok(ResourceOutcome::Created(created));
        };

        let hash_changed = existing.hash() != payload.hash();
        let changed_fields = payload.changed_fields(&existing);

        if !hash_changed && changed_fields.is_empty() {
            self.stats.resources_unchanged += 1;
            debug!(id = %existing.id, "Resource up to date");
            return Ok(ResourceOutcome::Unchanged(existing));
        }

        let id = existing.id.as_str();
        let updated = self.retry.run("resource_update", || {
            catalog.resource_update(id, payload, file)
        })?;
        self.stats.resources_updated += 1;
        info!(
            id = %updated.id,
            hash_changed,
            fields = ?changed_fields,
            "Updated resource"
        );
        Ok(ResourceOutcome::Updated(updated))
    }

    /// Fatal errors propagate; anything else is logged and becomes `None`.
    fn settle<T>(
        &mut self,
        result: Result<T, CatalogError>,
        entity: &str,
        key: &str,
    ) -> Result<Option<T>, CatalogError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(entity, key, error = %e, "Catalog synchronization failed");
                self.stats.failures += 1;
                Ok(None)
            }
        }
    }
}
