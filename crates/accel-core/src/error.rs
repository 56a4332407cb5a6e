//! # Accel Core Errors
//!
//! Defines [`AccelError`], the error type shared by every stage of the engine.
//!
//! Variants are grouped the way failures are treated by the engine:
//! scan errors are reported and skipped, descriptor validation, resource and
//! ambiguity errors are fatal for the descriptor they belong to, and
//! teardown failures are never raised at all (see
//! [`TeardownReport`](crate::native::TeardownReport)).
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AccelError {
    // --- Scan errors ---
    #[error("Archive error during '{operation}' on '{}': {source}", path.display())]
    Archive {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed type metadata for '{type_name}': {source}")]
    MalformedMetadata {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not resolve type '{type_name}'")]
    UnresolvedType { type_name: String },

    // --- Descriptor validation errors ---
    #[error("Descriptor declared on a type that contains no interception body: {type_name}")]
    MissingAdvice { type_name: String },

    #[error("Invalid acceleration descriptor on '{type_name}': {message}")]
    InvalidDescriptor { type_name: String, message: String },

    #[error("Stateful {kind} hook method: {method}")]
    StatefulHook { kind: HookKind, method: String },

    #[error("Inlined helper type '{helper}' of '{type_name}' could not be located")]
    MissingHelper { type_name: String, helper: String },

    #[error("No advice body bound for descriptor '{type_name}'")]
    UnboundAdvice { type_name: String },

    // --- Resource errors ---
    #[error("Native binary resource not found: {resource}")]
    MissingResource { resource: String },

    #[error("Failed to extract '{resource}' to a temporary file: {source}")]
    Extraction {
        resource: String,
        #[source]
        source: std::io::Error,
    },

    // --- Ambiguity errors ---
    #[error("No method matching {signature} on '{type_name}'")]
    NoMatchingMethod { type_name: String, signature: String },

    #[error("{count} methods matching {signature} on '{type_name}'")]
    AmbiguousMethod {
        type_name: String,
        signature: String,
        count: usize,
    },

    #[error("Call site {site} is already intercepted by '{existing}' with a different entry strategy than '{descriptor}'")]
    StrategyConflict {
        site: String,
        existing: String,
        descriptor: String,
    },

    // --- Lifecycle errors ---
    #[error("Activation of dispatcher '{dispatcher}' failed: {message}")]
    Activation { dispatcher: String, message: String },

    #[error("Native library '{}' could not be loaded: {message}", path.display())]
    LibraryLoad { path: PathBuf, message: String },

    #[error("Interception could not be installed for '{descriptor}': {message}")]
    Weave { descriptor: String, message: String },

    #[error("No call site registered for {site}")]
    UnknownCallSite { site: String },

    // --- Configuration errors ---
    #[error("Configuration error for '{}': {message}", path.display())]
    Config { path: PathBuf, message: String },
}

/// Which lifecycle slot a native hook occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum HookKind {
    #[error("init")]
    Init,
    #[error("destroy")]
    Destroy,
}

impl AccelError {
    pub fn archive(source: std::io::Error, operation: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        AccelError::Archive {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// True for failures that only ever produce a scan diagnostic.
    pub fn is_scan_error(&self) -> bool {
        matches!(
            self,
            AccelError::Archive { .. } | AccelError::MalformedMetadata { .. } | AccelError::UnresolvedType { .. }
        )
    }
}

/// Shorthand for Result with our Error type
pub type Result<T> = std::result::Result<T, AccelError>;
