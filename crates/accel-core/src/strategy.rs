//! # Interception Strategy Selector
//!
//! Chooses, once per descriptor, how the intercepting body is bound at the
//! matched call site.
use std::fmt;

use serde_json::Value;

use crate::descriptor::BehaviorFlags;
use crate::hooks::{call_guarded, AdviceFn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStrategy {
    /// The body runs without the call's arguments; the original result is not captured
    Trivial,
    /// The body sees the arguments and may replace the original call
    ArgumentPreserving,
}

impl EntryStrategy {
    pub fn select(flags: BehaviorFlags) -> Self {
        if flags.simple_entry && !flags.retain_arguments {
            EntryStrategy::Trivial
        } else {
            EntryStrategy::ArgumentPreserving
        }
    }

    pub fn forwards_arguments(&self) -> bool {
        matches!(self, EntryStrategy::ArgumentPreserving)
    }
}

impl fmt::Display for EntryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStrategy::Trivial => write!(f, "trivial"),
            EntryStrategy::ArgumentPreserving => write!(f, "argument-preserving"),
        }
    }
}

/// An advice body bound with its strategy.
#[derive(Clone)]
pub struct BoundAdvice {
    descriptor: String,
    strategy: EntryStrategy,
    body: AdviceFn,
    dev_mode: bool,
}

impl BoundAdvice {
    pub fn new(descriptor: &str, strategy: EntryStrategy, body: AdviceFn, dev_mode: bool) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            strategy,
            body,
            dev_mode,
        }
    }

    pub fn strategy(&self) -> EntryStrategy {
        self.strategy
    }

    /// Run the body for one call.
    ///
    /// Only the argument-preserving entry may replace the original call: a
    /// trivial body sees no arguments and whatever it returns is dropped.
    /// In dev mode a panicking body is logged and the original method runs
    /// instead; otherwise the panic propagates to the caller.
    pub fn enter(&self, args: &[Value]) -> Option<Value> {
        let forwards = self.strategy.forwards_arguments();
        let visible: &[Value] = if forwards { args } else { &[] };
        let result = if !self.dev_mode {
            (self.body)(visible)
        } else {
            match call_guarded(|| (self.body)(visible)) {
                Ok(result) => result,
                Err(message) => {
                    log::warn!(
                        "Advice of '{}' panicked ({}), falling back to the original method",
                        self.descriptor,
                        message
                    );
                    None
                }
            }
        };
        if forwards { result } else { None }
    }
}

impl fmt::Debug for BoundAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAdvice")
            .field("descriptor", &self.descriptor)
            .field("strategy", &self.strategy)
            .field("dev_mode", &self.dev_mode)
            .finish_non_exhaustive()
    }
}
