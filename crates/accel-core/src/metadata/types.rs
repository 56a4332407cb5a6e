use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker annotation for methods running before the intercepted method
pub const ON_METHOD_ENTER: &str = "OnMethodEnter";
/// Marker annotation for methods running after the intercepted method
pub const ON_METHOD_EXIT: &str = "OnMethodExit";
/// Marker annotation for dispatcher methods run after the library is loaded
pub const INIT_HOOK: &str = "Init";
/// Marker annotation for dispatcher methods run at teardown
pub const DESTROY_HOOK: &str = "Destroy";
/// Return type name of procedures without a result
pub const VOID: &str = "void";

/// Structural description of one compiled type.
///
/// Referenced types (parameter types, annotation values) are kept as names
/// and never resolved while describing the owning type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMetadata {
    /// Fully qualified name
    pub name: String,

    /// Code source the type was compiled into (a path or archive name)
    #[serde(default)]
    pub origin: Option<String>,

    /// Declared type-level annotations
    #[serde(default)]
    pub annotations: Vec<Annotation>,

    /// Declared methods, in declaration order
    #[serde(default)]
    pub methods: Vec<MethodMetadata>,
}

/// A declared annotation with its raw values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Qualified annotation name
    pub name: String,

    /// Annotation values, decoded only by whoever consumes the annotation
    #[serde(default)]
    pub values: Value,
}

/// A declared method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodMetadata {
    pub name: String,

    /// Parameter type names in declaration order
    #[serde(default)]
    pub parameters: Vec<String>,

    #[serde(default = "void_type")]
    pub return_type: String,

    #[serde(default, rename = "static")]
    pub is_static: bool,

    /// Compiler generated forwarding method
    #[serde(default)]
    pub bridge: bool,

    #[serde(default)]
    pub synthetic: bool,

    /// Marker annotations (`OnMethodEnter`, `Init`, ...)
    #[serde(default)]
    pub annotations: Vec<String>,
}

fn void_type() -> String {
    VOID.to_string()
}

impl TypeMetadata {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            origin: None,
            annotations: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Whether an annotation with the given name is declared on the type
    pub fn is_annotated_with(&self, annotation: &str) -> bool {
        self.annotations.iter().any(|a| a.name == annotation)
    }

    pub fn annotation(&self, annotation: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == annotation)
    }

    /// Declared methods carrying a marker annotation
    pub fn methods_annotated_with<'a>(&'a self, marker: &'a str) -> impl Iterator<Item = &'a MethodMetadata> + 'a {
        self.methods.iter().filter(move |m| m.is_annotated_with(marker))
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    pub fn with_method(mut self, method: MethodMetadata) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_annotation(mut self, name: &str, values: Value) -> Self {
        self.annotations.push(Annotation {
            name: name.to_string(),
            values,
        });
        self
    }
}

impl MethodMetadata {
    pub fn new(name: &str, parameters: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            return_type: void_type(),
            is_static: false,
            bridge: false,
            synthetic: false,
            annotations: Vec::new(),
        }
    }

    /// A parameterless static procedure, the only valid hook shape
    pub fn hook(name: &str, marker: &str) -> Self {
        Self::new(name, &[]).static_method().annotated(marker)
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn returning(mut self, return_type: &str) -> Self {
        self.return_type = return_type.to_string();
        self
    }

    pub fn annotated(mut self, marker: &str) -> Self {
        self.annotations.push(marker.to_string());
        self
    }

    pub fn bridged(mut self) -> Self {
        self.bridge = true;
        self
    }

    pub fn is_annotated_with(&self, marker: &str) -> bool {
        self.annotations.iter().any(|a| a == marker)
    }

    /// `static void name()`
    pub fn is_stateless_procedure(&self) -> bool {
        self.is_static && self.parameters.is_empty() && self.return_type == VOID
    }

    /// Signature rendered as `name(a,b)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameters.join(","))
    }
}

impl std::fmt::Display for MethodMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_static {
            write!(f, "static ")?;
        }
        write!(f, "{} {}", self.return_type, self.signature())
    }
}
