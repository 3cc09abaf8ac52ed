//! Resource names handed out during one run.
//!
//! Two local files must never share a resource name inside one dataset, or
//! each run would overwrite one with the other. The first file to claim a
//! name keeps it; later files fall back to their relative path. Items arrive
//! in walk order, which is sorted, so the same tree yields the same names on
//! every run.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ResourceNames {
    /// (dataset id, resource name) → relative path of the owning file
    claimed: HashMap<(String, String), String>,
}

impl ResourceNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name for the file at `relative_path` in `dataset_id`. Returns the
    /// name and whether it differs from `preferred`.
    pub fn assign(
        &mut self,
        dataset_id: &str,
        preferred: &str,
        relative_path: &str,
    ) -> (String, bool) {
        if self.claim(dataset_id, preferred, relative_path) {
            return (preferred.to_string(), false);
        }

        let mut candidate = relative_path.to_string();
        let mut n = 2;
        while !self.claim(dataset_id, &candidate, relative_path) {
            candidate = format!("{} ({})", relative_path, n);
            n += 1;
        }
        (candidate, true)
    }

    fn claim(&mut self, dataset_id: &str, name: &str, relative_path: &str) -> bool {
        let owner = self
            .claimed
            .entry((dataset_id.to_string(), name.to_string()))
            .or_insert_with(|| relative_path.to_string());
        owner == relative_path
    }
}
