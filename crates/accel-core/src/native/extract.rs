use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::archive::ModuleArchive;
use crate::error::{AccelError, Result};

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Where native binaries live inside an archive's resource space:
/// `folder/<prefix><binary>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryConvention {
    pub folder: String,
    pub prefix: String,
    pub extension: String,
}

impl BinaryConvention {
    pub fn new(folder: &str, prefix: &str, extension: &str) -> Self {
        Self {
            folder: folder.trim_end_matches('/').to_string(),
            prefix: prefix.to_string(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// File name of a binary without its folder
    pub fn file_name(&self, binary_name: &str) -> String {
        format!("{}{}.{}", self.prefix, binary_name, self.extension)
    }

    /// Archive resource path of a binary
    pub fn resource_name(&self, binary_name: &str) -> String {
        if self.folder.is_empty() {
            self.file_name(binary_name)
        } else {
            format!("{}/{}", self.folder, self.file_name(binary_name))
        }
    }
}

/// A binary copied out of an archive onto the local file system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBinary {
    /// Resource path inside the archive
    pub resource: String,
    /// Absolute path of the kept temporary copy
    pub path: PathBuf,
    pub size: u64,
}

/// Copy `binary_name` out of `archive` into a new, uniquely named temporary
/// file carrying the same extension.
///
/// The file is kept on disk; removing it is left to the operating system.
pub fn extract_binary(
    archive: &dyn ModuleArchive,
    convention: &BinaryConvention,
    binary_name: &str,
) -> Result<ExtractedBinary> {
    let resource = convention.resource_name(binary_name);
    let mut input = archive
        .open(&resource)?
        .ok_or_else(|| AccelError::MissingResource {
            resource: resource.clone(),
        })?;

    let extraction_error = |source: io::Error| AccelError::Extraction {
        resource: resource.clone(),
        source,
    };

    // Path separators in the binary name would escape the temp directory
    let stem = format!("{}{}-", convention.prefix, binary_name).replace(['/', '\\'], "_");
    let temp = tempfile::Builder::new()
        .prefix(&stem)
        .suffix(&format!(".{}", convention.extension))
        .tempfile()
        .map_err(extraction_error)?;

    let size = {
        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, temp.as_file());
        let copied = io::copy(&mut input, &mut writer).map_err(extraction_error)?;
        writer.flush().map_err(extraction_error)?;
        copied
    };

    let (_file, path) = temp.keep().map_err(|e| extraction_error(e.error))?;
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir().map_err(extraction_error)?.join(path)
    };

    log::debug!("Extracted {} ({} bytes) to {}", resource, size, path.display());
    Ok(ExtractedBinary { resource, path, size })
}
