use std::fmt;
use std::sync::Arc;

use crate::descriptor::InlinedHelper;
use crate::discovery::{DescriptorFailure, ScanDiagnostic};
use crate::native::{DispatcherArtifact, TeardownHandle, TeardownReport};
use crate::strategy::EntryStrategy;
use crate::weave::{CallSite, InterceptionHandle, Weaver};

/// One descriptor that made it through installation
#[derive(Debug, Clone)]
pub struct InstalledDescriptor {
    pub descriptor: String,
    /// The unique target method
    pub site: CallSite,
    pub strategy: EntryStrategy,
    pub inlined: Vec<InlinedHelper>,
    pub interception: InterceptionHandle,
    /// Artifacts of this descriptor's libraries, in declaration order
    pub artifacts: Vec<Arc<DispatcherArtifact>>,
}

impl fmt::Display for InstalledDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({}, {} libraries)",
            self.descriptor,
            self.site,
            self.strategy,
            self.artifacts.len()
        )
    }
}

/// Result of one engine run.
///
/// Artifacts (one per dispatcher) and destroy actions are kept in discovery
/// order. Dropping an installation leaves its interceptions in place; use
/// [`uninstall`](Installation::uninstall) to remove them and run teardown.
#[derive(Debug, Default)]
pub struct Installation {
    pub(crate) artifacts: Vec<Arc<DispatcherArtifact>>,
    pub(crate) teardown: TeardownHandle,
    pub(crate) descriptors: Vec<InstalledDescriptor>,
    pub(crate) failures: Vec<DescriptorFailure>,
    pub(crate) diagnostics: Vec<ScanDiagnostic>,
}

impl Installation {
    pub fn artifacts(&self) -> &[Arc<DispatcherArtifact>] {
        &self.artifacts
    }

    pub fn teardown_handle(&self) -> &TeardownHandle {
        &self.teardown
    }

    /// Run every collected destroy action once.
    pub fn teardown(&self) -> TeardownReport {
        self.teardown.teardown()
    }

    pub fn descriptors(&self) -> &[InstalledDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, name: &str) -> Option<&InstalledDescriptor> {
        self.descriptors.iter().find(|installed| installed.descriptor == name)
    }

    /// Descriptors skipped because of a fatal error (non-strict mode only)
    pub fn failures(&self) -> &[DescriptorFailure] {
        &self.failures
    }

    pub fn diagnostics(&self) -> &[ScanDiagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty() && self.artifacts.is_empty()
    }

    /// Remove every interception from `weaver`, then run teardown.
    pub fn uninstall(&self, weaver: &dyn Weaver) -> TeardownReport {
        for installed in self.descriptors.iter().rev() {
            if !weaver.remove(&installed.interception) {
                log::debug!("Interception for '{}' was already removed", installed.descriptor);
            }
        }
        self.teardown.teardown()
    }
}
