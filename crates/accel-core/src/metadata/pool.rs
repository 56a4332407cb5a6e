use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AccelError, Result};
use crate::metadata::{CompoundSource, TypeMetadata, TypeSource};

/// Outcome of describing a type by name
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Arc<TypeMetadata>),
    Unresolved(String),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// The described type, or [`AccelError::UnresolvedType`]
    pub fn resolve(self) -> Result<Arc<TypeMetadata>> {
        match self {
            Resolution::Resolved(metadata) => Ok(metadata),
            Resolution::Unresolved(type_name) => Err(AccelError::UnresolvedType { type_name }),
        }
    }
}

/// Lazily describes types from a backing source.
///
/// Describing a type parses only that type's own metadata. Types it refers
/// to (parameter types, annotation values, dispatchers) stay plain names
/// until someone describes them explicitly. Outcomes are cached per name,
/// except for malformed metadata which is reported on every request.
#[derive(Debug)]
pub struct TypePool {
    source: Arc<dyn TypeSource>,
    cache: Mutex<HashMap<String, Resolution>>,
}

impl TypePool {
    pub fn new(source: Arc<dyn TypeSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Pool over several sources, deduplicated by identity.
    pub fn of_sources<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn TypeSource>>,
    {
        Self::new(Arc::new(CompoundSource::new(sources)))
    }

    pub fn source(&self) -> &Arc<dyn TypeSource> {
        &self.source
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Resolution>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Describe `type_name` without touching any type it references.
    pub fn describe(&self, type_name: &str) -> Result<Resolution> {
        if let Some(cached) = self.cache().get(type_name) {
            return Ok(cached.clone());
        }

        let resolution = match self.source.locate(type_name)? {
            None => None,
            Some(bytes) => parse_definition(type_name, &bytes)?,
        };
        let resolution = match resolution {
            Some(metadata) => Resolution::Resolved(Arc::new(metadata)),
            None => Resolution::Unresolved(type_name.to_string()),
        };

        self.cache().insert(type_name.to_string(), resolution.clone());
        Ok(resolution)
    }

    /// Every definition of `type_name` across the backing sources, in
    /// source order. Same-named types from different origins all show up
    /// here, so callers can choose between them. Not cached.
    pub fn candidates(&self, type_name: &str) -> Result<Vec<Arc<TypeMetadata>>> {
        let mut candidates = Vec::new();
        for bytes in self.source.locate_all(type_name)? {
            if let Some(metadata) = parse_definition(type_name, &bytes)? {
                candidates.push(Arc::new(metadata));
            }
        }
        Ok(candidates)
    }

    /// Raw metadata bytes, bypassing the cache.
    pub fn locate_raw(&self, type_name: &str) -> Result<Option<Vec<u8>>> {
        self.source.locate(type_name)
    }

    /// Whether `type_name` has been described through this pool.
    pub fn is_cached(&self, type_name: &str) -> bool {
        self.cache().contains_key(type_name)
    }

    /// Number of names described so far.
    pub fn cached_count(&self) -> usize {
        self.cache().len()
    }
}

fn parse_definition(type_name: &str, bytes: &[u8]) -> Result<Option<TypeMetadata>> {
    let metadata: TypeMetadata = serde_json::from_slice(bytes).map_err(|source| AccelError::MalformedMetadata {
        type_name: type_name.to_string(),
        source,
    })?;
    if metadata.name != type_name {
        log::warn!(
            "Metadata located for '{}' describes '{}', treating as unresolved",
            type_name,
            metadata.name
        );
        return Ok(None);
    }
    Ok(Some(metadata))
}
