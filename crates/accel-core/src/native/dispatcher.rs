use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::error::{AccelError, Result};
use crate::native::{BoundHook, ExtractedBinary, LibraryLoader, LoadedLibrary};

/// The loader unit generated for one dispatcher type.
///
/// Activation loads the extracted binary and runs the init hooks in
/// declaration order. It happens at most once per artifact, even when first
/// touched from several threads at the same time; a failed activation is
/// remembered and reported again on every later touch.
pub struct DispatcherArtifact {
    dispatcher: String,
    descriptor: String,
    binary: ExtractedBinary,
    init_hooks: Vec<BoundHook>,
    loader: Arc<dyn LibraryLoader>,
    state: OnceLock<std::result::Result<Box<dyn LoadedLibrary>, String>>,
}

impl DispatcherArtifact {
    pub fn new(
        dispatcher: &str,
        descriptor: &str,
        binary: ExtractedBinary,
        init_hooks: Vec<BoundHook>,
        loader: Arc<dyn LibraryLoader>,
    ) -> Self {
        Self {
            dispatcher: dispatcher.to_string(),
            descriptor: descriptor.to_string(),
            binary,
            init_hooks,
            loader,
            state: OnceLock::new(),
        }
    }

    pub fn dispatcher(&self) -> &str {
        &self.dispatcher
    }

    /// Descriptor type this artifact was generated for
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn binary(&self) -> &ExtractedBinary {
        &self.binary
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary.path
    }

    pub fn init_hooks(&self) -> &[BoundHook] {
        &self.init_hooks
    }

    /// First-touch activation; later calls only report the first outcome.
    pub fn activate(&self) -> Result<()> {
        match self.state.get_or_init(|| self.run_activation()) {
            Ok(_) => Ok(()),
            Err(message) => Err(AccelError::Activation {
                dispatcher: self.dispatcher.clone(),
                message: message.clone(),
            }),
        }
    }

    fn run_activation(&self) -> std::result::Result<Box<dyn LoadedLibrary>, String> {
        log::debug!(
            "Activating dispatcher {} from {}",
            self.dispatcher,
            self.binary.path.display()
        );
        let library = self.loader.load(&self.binary.path).map_err(|e| e.to_string())?;
        for hook in &self.init_hooks {
            hook.invoke(library.as_ref())
                .map_err(|message| format!("init hook {} failed: {}", hook, message))?;
        }
        log::info!("Dispatcher {} ready ({} init hooks)", self.dispatcher, self.init_hooks.len());
        Ok(library)
    }

    pub fn is_activated(&self) -> bool {
        matches!(self.state.get(), Some(Ok(_)))
    }

    /// The loaded library, if activation has succeeded
    pub fn library(&self) -> Option<&dyn LoadedLibrary> {
        match self.state.get() {
            Some(Ok(library)) => Some(library.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Debug for DispatcherArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.get() {
            None => "pending",
            Some(Ok(_)) => "active",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("DispatcherArtifact")
            .field("dispatcher", &self.dispatcher)
            .field("descriptor", &self.descriptor)
            .field("binary", &self.binary)
            .field("init_hooks", &self.init_hooks)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}
