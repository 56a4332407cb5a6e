use std::fmt;

use crate::error::HookKind;
use crate::hooks::{call_guarded, HookFn};
use crate::native::LoadedLibrary;

/// What a lifecycle hook calls into
#[derive(Clone)]
pub enum HookTarget {
    /// A procedure registered by the host
    Host(HookFn),
    /// An exported procedure of the dispatcher's native library
    Native(String),
}

/// An `Init` or `Destroy` hook, validated and bound when its library is planned.
#[derive(Clone)]
pub struct BoundHook {
    pub dispatcher: String,
    pub method: String,
    pub kind: HookKind,
    pub target: HookTarget,
}

impl BoundHook {
    /// Run the hook against the dispatcher's loaded library. Panics are
    /// reported as errors.
    pub fn invoke(&self, library: &dyn LoadedLibrary) -> Result<(), String> {
        match &self.target {
            HookTarget::Host(hook) => call_guarded(|| hook()),
            HookTarget::Native(symbol) => library.call(symbol),
        }
    }
}

impl fmt::Display for BoundHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}()", self.dispatcher, self.method)
    }
}

impl fmt::Debug for BoundHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            HookTarget::Host(_) => "host".to_string(),
            HookTarget::Native(symbol) => format!("native:{}", symbol),
        };
        f.debug_struct("BoundHook")
            .field("dispatcher", &self.dispatcher)
            .field("method", &self.method)
            .field("kind", &self.kind)
            .field("target", &target)
            .finish()
    }
}
