//! # Descriptor Discovery
//!
//! Walks an archive in enumeration order and collects every type carrying
//! the acceleration annotation. Problems with individual entries never stop
//! the walk: unresolvable or malformed entries become [`ScanDiagnostic`]s,
//! invalid descriptors become [`DescriptorFailure`]s.
use std::fmt;
use std::sync::Arc;

use crate::archive::ModuleArchive;
use crate::descriptor::{AccelerationDescriptor, DescriptorHandle, ACCELERATION_ANNOTATION};
use crate::error::{AccelError, Result};
use crate::metadata::{Resolution, TypeMetadata, TypePool, ON_METHOD_ENTER, ON_METHOD_EXIT};

/// A non-fatal problem met while scanning one archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDiagnostic {
    pub entry: String,
    pub message: String,
}

impl fmt::Display for ScanDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entry, self.message)
    }
}

/// A descriptor that could not be installed, with the reason
#[derive(Debug)]
pub struct DescriptorFailure {
    pub descriptor: String,
    pub error: AccelError,
}

impl fmt::Display for DescriptorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.descriptor, self.error)
    }
}

/// Outcome of scanning one archive
#[derive(Debug, Default)]
pub struct Discovery {
    /// Annotated types in archive order, valid or not
    pub found: Vec<std::result::Result<DescriptorHandle, DescriptorFailure>>,
    pub diagnostics: Vec<ScanDiagnostic>,
}

impl Discovery {
    pub fn descriptors(&self) -> impl Iterator<Item = &DescriptorHandle> {
        self.found.iter().filter_map(|found| found.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &DescriptorFailure> {
        self.found.iter().filter_map(|found| found.as_ref().err())
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }
}

/// Scan `archive` for acceleration descriptors, describing types through `pool`.
///
/// Only failing to list the archive is an error.
pub fn discover(archive: &Arc<dyn ModuleArchive>, pool: &Arc<TypePool>) -> Result<Discovery> {
    let mut discovery = Discovery::default();

    for entry in archive.entries()? {
        let Some(type_name) = entry.type_name() else {
            continue;
        };

        let metadata = match pool.describe(&type_name) {
            Ok(Resolution::Resolved(metadata)) => metadata,
            Ok(Resolution::Unresolved(_)) => {
                log::warn!("Could not resolve: {}", entry.name);
                discovery.diagnostics.push(ScanDiagnostic {
                    entry: entry.name.clone(),
                    message: format!("could not resolve type '{}'", type_name),
                });
                continue;
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", entry.name, e);
                discovery.diagnostics.push(ScanDiagnostic {
                    entry: entry.name.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        if !metadata.is_annotated_with(ACCELERATION_ANNOTATION) {
            continue;
        }

        let found = describe_descriptor(metadata, pool, archive).map_err(|error| {
            log::error!("Invalid acceleration descriptor {}: {}", type_name, error);
            DescriptorFailure {
                descriptor: type_name.clone(),
                error,
            }
        });
        if let Ok(handle) = &found {
            log::debug!("Discovered {}", handle);
        }
        discovery.found.push(found);
    }

    Ok(discovery)
}

fn describe_descriptor(
    metadata: Arc<TypeMetadata>,
    pool: &Arc<TypePool>,
    archive: &Arc<dyn ModuleArchive>,
) -> Result<DescriptorHandle> {
    let has_advice = metadata
        .methods
        .iter()
        .any(|m| m.is_annotated_with(ON_METHOD_ENTER) || m.is_annotated_with(ON_METHOD_EXIT));
    if !has_advice {
        return Err(AccelError::MissingAdvice {
            type_name: metadata.name.clone(),
        });
    }

    let annotation = metadata
        .annotation(ACCELERATION_ANNOTATION)
        .ok_or_else(|| AccelError::InvalidDescriptor {
            type_name: metadata.name.clone(),
            message: "annotation disappeared while decoding".to_string(),
        })?;
    let descriptor = AccelerationDescriptor::from_annotation(&metadata.name, annotation)?;

    Ok(DescriptorHandle::new(metadata.clone(), descriptor, pool.clone(), archive.clone()))
}
