//! # Native Library Lifecycle
//!
//! For every library a descriptor references:
//!
//! 1. **Plan** ([`plan_library`]): resolve the dispatcher type, validate that
//!    each `Init`/`Destroy` hook is a static parameterless procedure and bind
//!    it to a host closure or an exported symbol.
//! 2. **Extract** ([`extract_binary`]): copy the binary resource into a kept
//!    temporary file.
//! 3. **Activate** ([`DispatcherArtifact::activate`]): load the binary and
//!    run the init hooks, once.
//! 4. **Destroy** ([`Destruction`], [`TeardownHandle`]): run the destroy
//!    hooks at teardown, never letting one failure stop the sweep.
pub mod dispatcher;
pub mod extract;
pub mod hook;
pub mod lifecycle;
pub mod loader;
pub mod teardown;

pub use dispatcher::DispatcherArtifact;
pub use extract::{extract_binary, BinaryConvention, ExtractedBinary};
pub use hook::{BoundHook, HookTarget};
pub use lifecycle::{plan_library, Binaries, LibraryPlan, NativeLifecycle};
pub use loader::{DynamicLibraryLoader, LibraryLoader, LoadedLibrary, NativeLibrary};
pub use teardown::{Destruction, TeardownFailure, TeardownHandle, TeardownReport};
