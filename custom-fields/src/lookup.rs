//! Display names for stored option ids and foreign references.
//!
//! Choice fields with inline options store option ids; fields with a
//! `lookup_type` store ids of records owned by the host. Hosts register a
//! [`TitleResolvable`] per lookup type so labels resolve without the core
//! knowing anything about the referenced records.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::types::FieldDefinition;

/// A source of human-readable titles for record ids.
pub trait TitleResolvable: Send + Sync {
    /// Title for `id`, `None` if the record no longer exists.
    fn title_for(&self, id: &str) -> Option<String>;
}

impl<F> TitleResolvable for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn title_for(&self, id: &str) -> Option<String> {
        self(id)
    }
}

/// Lookup sources keyed by `FieldDefinition::lookup_type`.
#[derive(Default, Clone)]
pub struct LookupRegistry {
    sources: HashMap<String, Arc<dyn TitleResolvable>>,
}

impl LookupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, replacing any previous one for the same type.
    pub fn register(
        mut self,
        lookup_type: impl Into<String>,
        source: impl TitleResolvable + 'static,
    ) -> Self {
        self.sources.insert(lookup_type.into(), Arc::new(source));
        self
    }

    pub fn get(&self, lookup_type: &str) -> Option<&Arc<dyn TitleResolvable>> {
        self.sources.get(lookup_type)
    }

    pub fn contains(&self, lookup_type: &str) -> bool {
        self.sources.contains_key(lookup_type)
    }

    /// Display names for `ids` in input order.
    ///
    /// Ids that do not resolve are dropped, so a stale reference never shows
    /// up as a raw number.
    pub fn resolve_lookup_values(&self, ids: &[String], field: &FieldDefinition) -> Vec<String> {
        match field.lookup_type.as_deref() {
            Some(lookup_type) => match self.get(lookup_type) {
                Some(source) => ids.iter().filter_map(|id| source.title_for(id)).collect(),
                None => {
                    debug!(
                        field = %field.code,
                        lookup_type,
                        "no lookup source registered"
                    );
                    Vec::new()
                }
            },
            None => ids
                .iter()
                .filter_map(|id| option_name(field, id))
                .collect(),
        }
    }
}

impl std::fmt::Debug for LookupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.sources.keys().collect();
        keys.sort();
        f.debug_struct("LookupRegistry")
            .field("sources", &keys)
            .finish()
    }
}

fn option_name(field: &FieldDefinition, id: &str) -> Option<String> {
    let id: i64 = id.trim().parse().ok()?;
    field
        .options
        .iter()
        .find(|o| o.id == id)
        .map(|o| o.name.clone())
}
