use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::archive::{entry_name_of, ModuleArchive};
use crate::error::{AccelError, Result};
use crate::metadata::TypeMetadata;

/// A backing source able to locate the raw metadata of a type by name.
///
/// Locating never interprets the bytes; interpretation is left to
/// [`TypePool`](crate::metadata::TypePool).
pub trait TypeSource: Send + Sync + Debug {
    /// Raw metadata bytes of `type_name`, `Ok(None)` when this source does not define it.
    fn locate(&self, type_name: &str) -> Result<Option<Vec<u8>>>;

    /// Every definition of `type_name` this source knows, in lookup order.
    fn locate_all(&self, type_name: &str) -> Result<Vec<Vec<u8>>> {
        Ok(self.locate(type_name)?.into_iter().collect())
    }
}

/// Type source reading `.type.json` entries out of a module archive.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    archive: Arc<dyn ModuleArchive>,
}

impl ArchiveSource {
    pub fn new(archive: Arc<dyn ModuleArchive>) -> Self {
        Self { archive }
    }

    pub fn archive(&self) -> &Arc<dyn ModuleArchive> {
        &self.archive
    }
}

impl TypeSource for ArchiveSource {
    fn locate(&self, type_name: &str) -> Result<Option<Vec<u8>>> {
        self.archive.read(&entry_name_of(type_name))
    }
}

/// Type source holding metadata registered by the host process.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    types: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register raw metadata under a type name
    pub fn insert_raw(&mut self, type_name: &str, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.types.insert(type_name.to_string(), bytes.into());
        self
    }

    /// Register host type metadata
    pub fn insert(&mut self, metadata: &TypeMetadata) -> Result<&mut Self> {
        let bytes = serde_json::to_vec(metadata).map_err(|source| AccelError::MalformedMetadata {
            type_name: metadata.name.clone(),
            source,
        })?;
        self.types.insert(metadata.name.clone(), bytes);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeSource for MemorySource {
    fn locate(&self, type_name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.types.get(type_name).cloned())
    }
}

/// Several sources queried in order; the first one defining a type wins,
/// while [`locate_all`](TypeSource::locate_all) collects every definition.
///
/// Sources are deduplicated by identity on construction, so passing the same
/// `Arc` twice (e.g. when the archive also backs the host) queries it once.
#[derive(Debug, Clone, Default)]
pub struct CompoundSource {
    sources: Vec<Arc<dyn TypeSource>>,
}

impl CompoundSource {
    pub fn new<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn TypeSource>>,
    {
        let mut compound = Self::default();
        for source in sources {
            compound.push(source);
        }
        compound
    }

    /// Append a source unless the very same source is already present.
    pub fn push(&mut self, source: Arc<dyn TypeSource>) -> bool {
        if self.sources.iter().any(|known| same_source(known, &source)) {
            return false;
        }
        self.sources.push(source);
        true
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Identity comparison that ignores vtable pointers.
fn same_source(a: &Arc<dyn TypeSource>, b: &Arc<dyn TypeSource>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl TypeSource for CompoundSource {
    fn locate(&self, type_name: &str) -> Result<Option<Vec<u8>>> {
        for source in &self.sources {
            if let Some(bytes) = source.locate(type_name)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    fn locate_all(&self, type_name: &str) -> Result<Vec<Vec<u8>>> {
        let mut found = Vec::new();
        for source in &self.sources {
            found.extend(source.locate_all(type_name)?);
        }
        Ok(found)
    }
}
