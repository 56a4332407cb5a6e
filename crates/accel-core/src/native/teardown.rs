use std::fmt;
use std::sync::Arc;

use crate::native::{BoundHook, DispatcherArtifact};

/// Destroy hooks of one dispatcher, bound to its artifact.
#[derive(Clone)]
pub struct Destruction {
    artifact: Arc<DispatcherArtifact>,
    hooks: Vec<BoundHook>,
}

impl Destruction {
    pub fn new(artifact: Arc<DispatcherArtifact>, hooks: Vec<BoundHook>) -> Self {
        Self { artifact, hooks }
    }

    pub fn dispatcher(&self) -> &str {
        self.artifact.dispatcher()
    }

    pub fn hooks(&self) -> &[BoundHook] {
        &self.hooks
    }

    /// Run every destroy hook once, in declaration order, recording failures
    /// instead of stopping.
    ///
    /// The dispatcher is activated first when nothing has touched it yet. If
    /// that fails, each of its hooks is reported as failed.
    pub fn run(&self, report: &mut TeardownReport) {
        if let Err(e) = self.artifact.activate() {
            log::warn!("Cannot run destroy hooks of {}: {}", self.dispatcher(), e);
            let message = e.to_string();
            report.failures.extend(self.hooks.iter().map(|hook| TeardownFailure {
                dispatcher: hook.dispatcher.clone(),
                hook: hook.method.clone(),
                message: message.clone(),
            }));
            return;
        }
        let Some(library) = self.artifact.library() else {
            return;
        };
        for hook in &self.hooks {
            match hook.invoke(library) {
                Ok(()) => report.invoked += 1,
                Err(message) => {
                    log::warn!("Destroy hook {} failed: {}", hook, message);
                    report.failures.push(TeardownFailure {
                        dispatcher: hook.dispatcher.clone(),
                        hook: hook.method.clone(),
                        message,
                    });
                }
            }
        }
    }
}

impl fmt::Debug for Destruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destruction")
            .field("dispatcher", &self.dispatcher())
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// A destroy hook that failed during teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub dispatcher: String,
    pub hook: String,
    pub message: String,
}

/// What one teardown sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Destroy hooks that completed
    pub invoked: usize,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Every destroy action collected by one installation, in discovery order.
///
/// Each call to [`teardown`](TeardownHandle::teardown) runs every action once;
/// calling it again runs them again. Not safe to call from several threads
/// at once.
#[derive(Debug, Clone, Default)]
pub struct TeardownHandle {
    destructions: Vec<Destruction>,
}

impl TeardownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, destruction: Destruction) {
        self.destructions.push(destruction);
    }

    pub fn extend(&mut self, other: TeardownHandle) {
        self.destructions.extend(other.destructions);
    }

    pub fn len(&self) -> usize {
        self.destructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destructions.is_empty()
    }

    pub fn teardown(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        for destruction in &self.destructions {
            destruction.run(&mut report);
        }
        if !report.is_clean() {
            log::warn!("Teardown finished with {} failed destroy hooks", report.failures.len());
        }
        report
    }
}
