//! # Acceleration Descriptors
//!
//! An [`AccelerationDescriptor`] is decoded from the `accel.Acceleration`
//! annotation of one archive type. It names the method to intercept, the
//! native libraries backing the accelerated path and the entry strategy.
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::archive::ModuleArchive;
use crate::error::{AccelError, Result};
use crate::matcher::{MethodMatcher, TypeMatcher};
use crate::metadata::{Annotation, TypePool, TypeMetadata};
use crate::strategy::EntryStrategy;

/// Qualified name of the descriptor annotation
pub const ACCELERATION_ANNOTATION: &str = "accel.Acceleration";

// --- Intermediate structs for deserialization ---

#[derive(Deserialize, Debug)]
struct RawLibrary {
    dispatcher: String,
    binary: String,
}

#[derive(Deserialize, Debug)]
struct RawAcceleration {
    #[serde(rename = "type")]
    target_type: String,
    method: String,
    #[serde(default)]
    parameters: Vec<String>,
    #[serde(default)]
    libraries: Vec<RawLibrary>,
    #[serde(default)]
    retain_arguments: bool,
    #[serde(default)]
    simple_entry: bool,
    #[serde(default)]
    expected_names: Vec<String>,
    #[serde(default)]
    inline: Vec<String>,
}

// --- End Intermediate structs ---

/// One native binary backing a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryReference {
    /// Logical resource name, expanded with the configured folder/prefix/extension
    pub binary_name: String,
    /// Type whose first activation loads the binary; its `Init`/`Destroy`
    /// methods are the library's hooks
    pub dispatcher_type: String,
}

/// How much of the original call the intercepting body sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BehaviorFlags {
    pub retain_arguments: bool,
    pub simple_entry: bool,
}

/// Declarative request to accelerate one method
#[derive(Debug, Clone, PartialEq)]
pub struct AccelerationDescriptor {
    pub target_type: String,
    pub target_method: String,
    pub parameter_types: Vec<String>,
    pub libraries: Vec<LibraryReference>,
    pub behavior: BehaviorFlags,
    /// Allowed code origins of the target type; empty means any origin
    pub expected_provenance: Vec<String>,
    /// Helper types shipped along with the interception
    pub inlined_helpers: Vec<String>,
}

impl AccelerationDescriptor {
    /// Decode the annotation declared on `type_name`.
    pub fn from_annotation(type_name: &str, annotation: &Annotation) -> Result<Self> {
        let invalid = |message: String| AccelError::InvalidDescriptor {
            type_name: type_name.to_string(),
            message,
        };

        let raw: RawAcceleration = serde_json::from_value(annotation.values.clone())
            .map_err(|e| invalid(format!("Failed to decode annotation values: {}", e)))?;

        if raw.target_type.trim().is_empty() {
            return Err(invalid("target type must not be empty".to_string()));
        }
        if raw.method.trim().is_empty() {
            return Err(invalid("target method must not be empty".to_string()));
        }
        if raw.retain_arguments && raw.simple_entry {
            return Err(invalid(
                "retain_arguments and simple_entry cannot both be set".to_string(),
            ));
        }

        let mut libraries = Vec::with_capacity(raw.libraries.len());
        for library in raw.libraries {
            if library.binary.trim().is_empty() || library.dispatcher.trim().is_empty() {
                return Err(invalid(format!(
                    "library entry needs both a binary and a dispatcher (binary='{}', dispatcher='{}')",
                    library.binary, library.dispatcher
                )));
            }
            libraries.push(LibraryReference {
                binary_name: library.binary,
                dispatcher_type: library.dispatcher,
            });
        }

        Ok(Self {
            target_type: raw.target_type,
            target_method: raw.method,
            parameter_types: raw.parameters,
            libraries,
            behavior: BehaviorFlags {
                retain_arguments: raw.retain_arguments,
                simple_entry: raw.simple_entry,
            },
            expected_provenance: raw.expected_names,
            inlined_helpers: raw.inline,
        })
    }

    /// `method(a,b)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.target_method, self.parameter_types.join(","))
    }
}

/// Helper type metadata travelling with an installed interception
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinedHelper {
    pub type_name: String,
    pub bytes: Vec<u8>,
}

/// A discovered descriptor with the context it was found in.
///
/// Holds only what is needed to keep working with the descriptor: the
/// declaring type's name and metadata, the pool that described it and the
/// archive that defines its resources.
#[derive(Clone)]
pub struct DescriptorHandle {
    name: String,
    metadata: Arc<TypeMetadata>,
    descriptor: AccelerationDescriptor,
    pool: Arc<TypePool>,
    archive: Arc<dyn ModuleArchive>,
}

impl DescriptorHandle {
    pub fn new(
        metadata: Arc<TypeMetadata>,
        descriptor: AccelerationDescriptor,
        pool: Arc<TypePool>,
        archive: Arc<dyn ModuleArchive>,
    ) -> Self {
        Self {
            name: metadata.name.clone(),
            metadata,
            descriptor,
            pool,
            archive,
        }
    }

    /// Qualified name of the declaring (advice) type
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &Arc<TypeMetadata> {
        &self.metadata
    }

    pub fn descriptor(&self) -> &AccelerationDescriptor {
        &self.descriptor
    }

    pub fn pool(&self) -> &Arc<TypePool> {
        &self.pool
    }

    /// The archive whose resource space holds the native binaries
    pub fn archive(&self) -> &Arc<dyn ModuleArchive> {
        &self.archive
    }

    pub fn type_matcher(&self, suppress_provenance: bool) -> TypeMatcher {
        TypeMatcher::for_descriptor(&self.descriptor, suppress_provenance)
    }

    pub fn method_matcher(&self) -> MethodMatcher {
        MethodMatcher::for_descriptor(&self.descriptor)
    }

    pub fn strategy(&self) -> EntryStrategy {
        EntryStrategy::select(self.descriptor.behavior)
    }

    /// Raw metadata of every inlined helper type, in declaration order.
    pub fn inlined(&self) -> Result<Vec<InlinedHelper>> {
        let mut helpers = Vec::with_capacity(self.descriptor.inlined_helpers.len());
        for helper in &self.descriptor.inlined_helpers {
            let bytes = self.pool.locate_raw(helper)?.ok_or_else(|| AccelError::MissingHelper {
                type_name: self.name.clone(),
                helper: helper.clone(),
            })?;
            helpers.push(InlinedHelper {
                type_name: helper.clone(),
                bytes,
            });
        }
        Ok(helpers)
    }
}

impl fmt::Debug for DescriptorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorHandle")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("archive", &self.archive.location())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DescriptorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ (type={}, method={}, parameters=[{}])",
            self.name,
            self.descriptor.target_type,
            self.descriptor.target_method,
            self.descriptor.parameter_types.join(",")
        )
    }
}
