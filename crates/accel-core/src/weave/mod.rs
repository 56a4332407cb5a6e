//! # Weaving
//!
//! The engine never rewrites code itself. It hands an [`Interception`] to a
//! [`Weaver`], which binds it to every call site selected by the matchers
//! and returns a handle that can undo the binding. [`CallSiteTable`] is the
//! in-process weaver used by hosts that dispatch calls through a table.
pub mod table;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::matcher::{MethodMatcher, TypeMatcher};
use crate::native::DispatcherArtifact;
use crate::strategy::{BoundAdvice, EntryStrategy};

pub use table::{CallSiteTable, MethodBody};

/// One concrete `(type, method)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSite {
    pub type_name: String,
    /// Method signature, `name(a,b)`
    pub method: String,
}

impl CallSite {
    pub fn new(type_name: &str, method: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            method: method.to_string(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.method)
    }
}

/// Everything needed to intercept calls for one descriptor
#[derive(Debug, Clone)]
pub struct Interception {
    pub descriptor: String,
    pub type_matcher: TypeMatcher,
    pub method_matcher: MethodMatcher,
    pub advice: BoundAdvice,
    /// Dispatchers touched before the advice body first runs
    pub dispatchers: Vec<Arc<DispatcherArtifact>>,
}

impl Interception {
    pub fn strategy(&self) -> EntryStrategy {
        self.advice.strategy()
    }

    /// Handle one intercepted call: make sure every dispatcher is active,
    /// then run the advice. `Ok(None)` means the original method should run.
    pub fn intercept(&self, args: &[Value]) -> Result<Option<Value>> {
        for dispatcher in &self.dispatchers {
            dispatcher.activate()?;
        }
        Ok(self.advice.enter(args))
    }
}

/// Proof of an installed interception
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptionHandle {
    pub id: u64,
    pub descriptor: String,
    /// Sites bound at installation time
    pub sites: Vec<CallSite>,
}

/// Installs interceptions at call sites.
///
/// Installing is idempotent per descriptor and `(type, method)` pair, and
/// reversible through the returned handle.
pub trait Weaver: Send + Sync + fmt::Debug {
    fn install(&self, interception: Interception) -> Result<InterceptionHandle>;

    /// Undo an installation. Returns false when the handle was unknown.
    fn remove(&self, handle: &InterceptionHandle) -> bool;
}
