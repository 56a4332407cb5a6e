use std::path::{Path, PathBuf};
use std::sync::Arc;

use accel_core::archive::{DirectoryArchive, ModuleArchive};
use accel_core::metadata::ArchiveSource;
use accel_core::native::extract_binary;
use accel_core::{CallSiteTable, Engine, EngineOptions, HookRegistry, Result, Weaver};
use log::{info, warn};
use serde_json::json;

/// Options shared by the engine backed commands.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub types: Option<PathBuf>,
    pub strict: bool,
    pub dev_mode: bool,
    pub lazy: bool,
}

impl Settings {
    /// Options from the config file (or defaults), overridden by flags
    pub fn options(&self) -> Result<EngineOptions> {
        let mut options = match &self.config {
            Some(path) => EngineOptions::from_path(path)?,
            None => EngineOptions::default(),
        };
        options.strict_all_or_nothing |= self.strict;
        options.dev_mode |= self.dev_mode;
        if self.lazy {
            options.eager_activation = false;
        }
        Ok(options)
    }
}

fn open_archive(path: &Path) -> Arc<dyn ModuleArchive> {
    Arc::new(DirectoryArchive::new(path))
}

fn build_engine(settings: &Settings, weaver: Arc<dyn Weaver>) -> Result<Engine> {
    let mut hooks = HookRegistry::new();
    // Without host code to run, every intercepted call proceeds to the original method
    hooks.set_default_advice(|_| None);

    let mut engine = Engine::new(settings.options()?, weaver).with_hooks(hooks);
    if let Some(types) = &settings.types {
        info!("Using extra type metadata from {}", types.display());
        engine = engine.with_source(Arc::new(ArchiveSource::new(open_archive(types))));
    }
    Ok(engine)
}

pub fn scan(archive: &Path, settings: &Settings, as_json: bool) -> Result<()> {
    let engine = build_engine(settings, Arc::new(CallSiteTable::new()))?;
    let discovery = engine.discover(&open_archive(archive))?;

    if as_json {
        let descriptors: Vec<_> = discovery
            .descriptors()
            .map(|handle| {
                let descriptor = handle.descriptor();
                json!({
                    "name": handle.name(),
                    "type": descriptor.target_type,
                    "method": descriptor.signature(),
                    "strategy": handle.strategy().to_string(),
                    "libraries": descriptor
                        .libraries
                        .iter()
                        .map(|l| json!({"binary": l.binary_name, "dispatcher": l.dispatcher_type}))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        let failures: Vec<_> = discovery
            .failures()
            .map(|f| json!({"descriptor": f.descriptor, "error": f.error.to_string()}))
            .collect();
        let diagnostics: Vec<_> = discovery
            .diagnostics
            .iter()
            .map(|d| json!({"entry": d.entry, "message": d.message}))
            .collect();
        let report = json!({
            "descriptors": descriptors,
            "failures": failures,
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string()));
        return Ok(());
    }

    println!("Descriptors in {}:", archive.display());
    if discovery.is_empty() {
        println!("  (none)");
    }
    for handle in discovery.descriptors() {
        println!("  {} [{}]", handle, handle.strategy());
        for library in &handle.descriptor().libraries {
            println!("    - {} via {}", library.binary_name, library.dispatcher_type);
        }
    }
    for failure in discovery.failures() {
        println!("  invalid: {}", failure);
    }
    for diagnostic in &discovery.diagnostics {
        println!("  skipped: {}", diagnostic);
    }
    Ok(())
}

pub fn extract(archive: &Path, binary: &str, settings: &Settings) -> Result<()> {
    let options = settings.options()?;
    let archive = open_archive(archive);
    let extracted = extract_binary(archive.as_ref(), &options.convention(), binary)?;
    info!("Extracted {} ({} bytes)", extracted.resource, extracted.size);
    println!("{}", extracted.path.display());
    Ok(())
}

/// Install every descriptor, report, then tear down again.
pub fn install(archive: &Path, settings: &Settings) -> Result<()> {
    let table = Arc::new(CallSiteTable::new());
    let engine = build_engine(settings, table.clone())?;
    let installation = engine.install(&open_archive(archive))?;

    for installed in installation.descriptors() {
        println!("Installed {}", installed);
        for helper in &installed.inlined {
            println!("  inlined {} ({} bytes)", helper.type_name, helper.bytes.len());
        }
    }
    for artifact in installation.artifacts() {
        let state = if artifact.is_activated() { "active" } else { "pending" };
        println!(
            "Artifact {} [{}] {}",
            artifact.dispatcher(),
            state,
            artifact.binary_path().display()
        );
    }
    for failure in installation.failures() {
        println!("Failed {}", failure);
    }
    for diagnostic in installation.diagnostics() {
        println!("Skipped {}", diagnostic);
    }
    println!(
        "{} installed, {} failed, {} interceptions active",
        installation.descriptors().len(),
        installation.failures().len(),
        table.installed_count()
    );

    let report = installation.uninstall(&*table);
    for failure in &report.failures {
        warn!("Destroy hook {}.{} failed: {}", failure.dispatcher, failure.hook, failure.message);
    }
    println!(
        "Teardown: {} destroy hooks run, {} failed",
        report.invoked,
        report.failures.len()
    );
    Ok(())
}
