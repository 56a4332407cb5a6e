pub mod archive;
pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod matcher;
pub mod metadata;
pub mod native;
pub mod strategy;
pub mod weave;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key public types for the binary and embedding hosts
pub use archive::{DirectoryArchive, MemoryArchive, ModuleArchive};
pub use config::{ConfigFormat, EngineOptions};
pub use descriptor::{AccelerationDescriptor, DescriptorHandle, LibraryReference};
pub use discovery::{discover, Discovery};
pub use engine::{Engine, InstalledDescriptor, Installation};
pub use error::{AccelError, Result};
pub use hooks::HookRegistry;
pub use metadata::{MemorySource, TypeMetadata, TypePool, TypeSource};
pub use native::{DispatcherArtifact, TeardownHandle, TeardownReport};
pub use strategy::EntryStrategy;
pub use weave::{CallSite, CallSiteTable, Weaver};
