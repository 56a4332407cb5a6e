use std::fmt::Debug;
use std::panic;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::error::{AccelError, Result};
use crate::hooks::panic_message;

/// A native library loaded into the process.
pub trait LoadedLibrary: Send + Sync + Debug {
    fn path(&self) -> &Path;

    /// Invoke an exported parameterless procedure.
    fn call(&self, symbol: &str) -> std::result::Result<(), String>;
}

/// Loads native binaries. The default is [`DynamicLibraryLoader`].
pub trait LibraryLoader: Send + Sync + Debug {
    fn load(&self, path: &Path) -> Result<Box<dyn LoadedLibrary>>;
}

/// Loads binaries with the platform dynamic linker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicLibraryLoader;

impl LibraryLoader for DynamicLibraryLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn LoadedLibrary>> {
        // Loading runs the library's own initializers
        let library = unsafe { Library::new(path) }.map_err(|e| AccelError::LibraryLoad {
            path: path.to_path_buf(),
            message: format!("libloading error: {}", e),
        })?;
        log::info!("Loaded native library {}", path.display());
        Ok(Box::new(NativeLibrary {
            path: path.to_path_buf(),
            library,
        }))
    }
}

#[derive(Debug)]
pub struct NativeLibrary {
    path: PathBuf,
    library: Library,
}

impl LoadedLibrary for NativeLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn call(&self, symbol: &str) -> std::result::Result<(), String> {
        type HookProc = unsafe extern "C-unwind" fn();

        let mut name = symbol.as_bytes().to_vec();
        name.push(0);
        let proc_symbol: Symbol<HookProc> = unsafe { self.library.get(&name) }
            .map_err(|e| format!("missing symbol {}: {}", symbol, e))?;
        let func: HookProc = *proc_symbol;

        panic::catch_unwind(|| unsafe { func() }).map_err(panic_message)
    }
}
