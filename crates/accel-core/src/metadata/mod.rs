//! # Metadata Resolver
//!
//! Answers "describe type T" from declarative metadata without loading or
//! executing T. The building blocks are:
//!
//! - [`TypeMetadata`] / [`MethodMetadata`]: the structural model of a type.
//! - [`TypeSource`]: pluggable adapters locating raw metadata by name
//!   ([`ArchiveSource`], [`MemorySource`]), combined by [`CompoundSource`]
//!   which drops duplicate sources by identity.
//! - [`TypePool`]: lazy, caching resolution on top of a source.
pub mod pool;
pub mod source;
pub mod types;

pub use pool::{Resolution, TypePool};
pub use source::{ArchiveSource, CompoundSource, MemorySource, TypeSource};
pub use types::{
    Annotation, MethodMetadata, TypeMetadata, DESTROY_HOOK, INIT_HOOK, ON_METHOD_ENTER, ON_METHOD_EXIT, VOID,
};
