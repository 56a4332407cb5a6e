//! # Call-Site Matcher
//!
//! Predicates selecting the target type and method of a descriptor. A
//! matcher only answers "does this site match"; conflicts between
//! descriptors are resolved by the engine.
use std::fmt;

use crate::descriptor::AccelerationDescriptor;
use crate::metadata::{MethodMetadata, TypeMetadata};

/// Selects the declared target type, optionally narrowed by code origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMatcher {
    type_name: String,
    expected_origins: Vec<String>,
}

impl TypeMatcher {
    pub fn named(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            expected_origins: Vec::new(),
        }
    }

    /// Narrow the match to types whose origin is one of `origins`
    pub fn with_expected_origins(mut self, origins: Vec<String>) -> Self {
        self.expected_origins = origins;
        self
    }

    pub fn for_descriptor(descriptor: &AccelerationDescriptor, suppress_provenance: bool) -> Self {
        let matcher = Self::named(&descriptor.target_type);
        if suppress_provenance || descriptor.expected_provenance.is_empty() {
            matcher
        } else {
            matcher.with_expected_origins(descriptor.expected_provenance.clone())
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_provenance_filtered(&self) -> bool {
        !self.expected_origins.is_empty()
    }

    pub fn matches(&self, candidate: &TypeMetadata) -> bool {
        candidate.name == self.type_name && self.matches_origin(candidate.origin.as_deref())
    }

    fn matches_origin(&self, origin: Option<&str>) -> bool {
        if self.expected_origins.is_empty() {
            return true;
        }
        let Some(origin) = origin else {
            return false;
        };
        // An origin is usually a path or URL; compare its last segment too
        let trimmed = origin.trim_end_matches(['/', '\\']);
        let last_segment = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
        self.expected_origins
            .iter()
            .any(|expected| expected == origin || expected == last_segment)
    }
}

/// Selects methods by name, exact arity and per-position parameter type.
///
/// Bridge and synthetic methods never match, so compiler generated
/// forwarders are not intercepted a second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMatcher {
    name: String,
    parameters: Vec<String>,
}

impl MethodMatcher {
    pub fn new(name: &str, parameters: &[String]) -> Self {
        Self {
            name: name.to_string(),
            parameters: parameters.to_vec(),
        }
    }

    pub fn for_descriptor(descriptor: &AccelerationDescriptor) -> Self {
        Self::new(&descriptor.target_method, &descriptor.parameter_types)
    }

    pub fn matches(&self, candidate: &MethodMetadata) -> bool {
        candidate.name == self.name
            && candidate.parameters.len() == self.parameters.len()
            && candidate
                .parameters
                .iter()
                .zip(&self.parameters)
                .all(|(actual, expected)| actual == expected)
            && !candidate.bridge
            && !candidate.synthetic
    }

    /// Matching methods of `candidate`, in declaration order
    pub fn select<'a>(&'a self, candidate: &'a TypeMetadata) -> impl Iterator<Item = &'a MethodMetadata> + 'a {
        candidate.methods.iter().filter(move |m| self.matches(m))
    }
}

impl fmt::Display for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameters.join(","))
    }
}
