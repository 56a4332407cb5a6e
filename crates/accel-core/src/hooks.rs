//! # Hook Registry
//!
//! Typed host callables bound at discovery time: lifecycle hooks of
//! dispatcher types and the advice bodies of descriptor types. Hooks that
//! are not registered here are resolved as exported symbols of the native
//! library instead (see [`HookTarget`](crate::native::HookTarget)).
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

/// A parameterless, process-wide procedure
pub type HookFn = Arc<dyn Fn() + Send + Sync>;

/// An intercepting body. Receives the call arguments it is allowed to see and
/// returns `Some(result)` to replace the original call or `None` to let the
/// original method run.
pub type AdviceFn = Arc<dyn Fn(&[Value]) -> Option<Value> + Send + Sync>;

#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, HookFn>,
    advice: HashMap<String, AdviceFn>,
    default_advice: Option<AdviceFn>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `dispatcher.method` to a host procedure
    pub fn register_hook<F>(&mut self, dispatcher: &str, method: &str, hook: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.insert(hook_key(dispatcher, method), Arc::new(hook));
        self
    }

    /// Bind the advice body of a descriptor type
    pub fn register_advice<F>(&mut self, descriptor_type: &str, body: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Option<Value> + Send + Sync + 'static,
    {
        self.advice.insert(descriptor_type.to_string(), Arc::new(body));
        self
    }

    /// Advice used for descriptor types without a registered body
    pub fn set_default_advice<F>(&mut self, body: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Option<Value> + Send + Sync + 'static,
    {
        self.default_advice = Some(Arc::new(body));
        self
    }

    pub fn hook(&self, dispatcher: &str, method: &str) -> Option<HookFn> {
        self.hooks.get(&hook_key(dispatcher, method)).cloned()
    }

    pub fn advice(&self, descriptor_type: &str) -> Option<AdviceFn> {
        self.advice
            .get(descriptor_type)
            .cloned()
            .or_else(|| self.default_advice.clone())
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hooks: Vec<&String> = self.hooks.keys().collect();
        hooks.sort();
        let mut advice: Vec<&String> = self.advice.keys().collect();
        advice.sort();
        f.debug_struct("HookRegistry")
            .field("hooks", &hooks)
            .field("advice", &advice)
            .field("default_advice", &self.default_advice.is_some())
            .finish()
    }
}

fn hook_key(dispatcher: &str, method: &str) -> String {
    format!("{}.{}", dispatcher, method)
}

/// Run `f`, turning a panic into its message.
pub(crate) fn call_guarded<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s_ref) = payload.downcast_ref::<&'static str>() {
        (*s_ref).to_string()
    } else if let Some(s_obj) = payload.downcast_ref::<String>() {
        s_obj.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}
