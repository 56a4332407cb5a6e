//! Fixtures shared by the test modules: a recording library loader and a
//! builder for in-memory archives.
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::archive::MemoryArchive;
use crate::config::EngineOptions;
use crate::descriptor::ACCELERATION_ANNOTATION;
use crate::error::{AccelError, Result};
use crate::metadata::{MethodMetadata, TypeMetadata, DESTROY_HOOK, INIT_HOOK, ON_METHOD_ENTER};
use crate::native::{LibraryLoader, LoadedLibrary};

/// Loader that never touches the dynamic linker and records every load and
/// symbol call as `load:<file name>` / `call:<symbol>`.
#[derive(Clone, Default)]
pub struct RecordingLoader {
    events: Arc<Mutex<Vec<String>>>,
    failing_symbols: Arc<HashSet<String>>,
    fail_loads: bool,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls to `symbol` fail
    pub fn failing_symbol(mut self, symbol: &str) -> Self {
        let mut failing = (*self.failing_symbols).clone();
        failing.insert(symbol.to_string());
        self.failing_symbols = Arc::new(failing);
        self
    }

    pub fn failing_loads(mut self) -> Self {
        self.fail_loads = true;
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| event.strip_prefix("call:").map(str::to_string))
            .collect()
    }

    pub fn load_count(&self) -> usize {
        self.events().iter().filter(|event| event.starts_with("load:")).count()
    }
}

impl fmt::Debug for RecordingLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingLoader").field("events", &self.events()).finish()
    }
}

impl LibraryLoader for RecordingLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn LoadedLibrary>> {
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.events.lock().unwrap().push(format!("load:{}", file_name));
        if self.fail_loads {
            return Err(AccelError::LibraryLoad {
                path: path.to_path_buf(),
                message: "refused by test loader".to_string(),
            });
        }
        Ok(Box::new(RecordingLibrary {
            path: path.to_path_buf(),
            events: self.events.clone(),
            failing_symbols: self.failing_symbols.clone(),
        }))
    }
}

#[derive(Debug)]
struct RecordingLibrary {
    path: PathBuf,
    events: Arc<Mutex<Vec<String>>>,
    failing_symbols: Arc<HashSet<String>>,
}

impl LoadedLibrary for RecordingLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn call(&self, symbol: &str) -> std::result::Result<(), String> {
        self.events.lock().unwrap().push(format!("call:{}", symbol));
        if self.failing_symbols.contains(symbol) {
            return Err(format!("symbol {} failed", symbol));
        }
        Ok(())
    }
}

pub fn type_json(metadata: &TypeMetadata) -> Vec<u8> {
    serde_json::to_vec(metadata).unwrap()
}

/// Resource path of `binary` under the default options
pub fn binary_resource(binary: &str) -> String {
    EngineOptions::default().convention().resource_name(binary)
}

/// `accel.Acceleration` values for a descriptor targeting `target.method(parameters)`
pub fn acceleration(target: &str, method: &str, parameters: &[&str], libraries: &[(&str, &str)]) -> Value {
    json!({
        "type": target,
        "method": method,
        "parameters": parameters,
        "libraries": libraries
            .iter()
            .map(|(dispatcher, binary)| json!({"dispatcher": dispatcher, "binary": binary}))
            .collect::<Vec<_>>(),
    })
}

/// A descriptor type with one `OnMethodEnter` body
pub fn descriptor_type(name: &str, values: Value) -> TypeMetadata {
    TypeMetadata::new(name)
        .with_annotation(ACCELERATION_ANNOTATION, values)
        .with_method(MethodMetadata::new("enter", &[]).static_method().annotated(ON_METHOD_ENTER))
}

/// A dispatcher declaring the given init and destroy hooks
pub fn dispatcher_type(name: &str, init: &[&str], destroy: &[&str]) -> TypeMetadata {
    let mut dispatcher = TypeMetadata::new(name);
    for hook in init {
        dispatcher = dispatcher.with_method(MethodMetadata::hook(hook, INIT_HOOK));
    }
    for hook in destroy {
        dispatcher = dispatcher.with_method(MethodMetadata::hook(hook, DESTROY_HOOK));
    }
    dispatcher
}

/// Fluent builder over [`MemoryArchive`]
pub struct ArchiveBuilder {
    archive: MemoryArchive,
}

impl ArchiveBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            archive: MemoryArchive::new(name),
        }
    }

    pub fn with_type(mut self, metadata: &TypeMetadata) -> Self {
        self.archive.add_type(&metadata.name, type_json(metadata));
        self
    }

    pub fn with_binary(mut self, binary: &str, bytes: &[u8]) -> Self {
        self.archive.add_entry(&binary_resource(binary), bytes.to_vec());
        self
    }

    pub fn with_entry(mut self, name: &str, bytes: &[u8]) -> Self {
        self.archive.add_entry(name, bytes.to_vec());
        self
    }

    pub fn build(self) -> MemoryArchive {
        self.archive
    }
}

/// The target type `com.acme.Target` with `int compute(int)`
pub fn compute_target() -> TypeMetadata {
    TypeMetadata::new("com.acme.Target").with_method(MethodMetadata::new("compute", &["int"]).returning("int"))
}

/// One descriptor `com.acme.ComputeAccel` intercepting `compute(int)`,
/// backed by binary `accel-core` whose dispatcher declares `setup`/`teardown`.
pub fn scenario_archive() -> MemoryArchive {
    ArchiveBuilder::new("scenario")
        .with_type(&descriptor_type(
            "com.acme.ComputeAccel",
            acceleration(
                "com.acme.Target",
                "compute",
                &["int"],
                &[("com.acme.Dispatcher", "accel-core")],
            ),
        ))
        .with_type(&dispatcher_type("com.acme.Dispatcher", &["setup"], &["teardown"]))
        .with_type(&compute_target())
        .with_binary("accel-core", b"\x7fELF fake accel-core")
        .build()
}
