//! # Module Archives
//!
//! A module archive is a sequential container of named entries. Entries whose
//! name ends in [`TYPE_ENTRY_SUFFIX`] hold type metadata; every other entry is
//! an opaque resource (native binaries live here).
use std::fmt::Debug;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::{AccelError, Result};

/// Suffix of entries carrying compiled type metadata
pub const TYPE_ENTRY_SUFFIX: &str = ".type.json";

/// One named entry of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Slash separated path inside the archive
    pub name: String,
    /// Directory entries are listed but never scanned
    pub is_dir: bool,
}

impl ArchiveEntry {
    /// Qualified type name for a type entry, `None` for directories and resources.
    pub fn type_name(&self) -> Option<String> {
        if self.is_dir {
            return None;
        }
        type_name_of(&self.name)
    }
}

/// Map `com/acme/Fast.type.json` to `com.acme.Fast`.
pub fn type_name_of(entry_name: &str) -> Option<String> {
    entry_name
        .strip_suffix(TYPE_ENTRY_SUFFIX)
        .filter(|stem| !stem.is_empty())
        .map(|stem| stem.replace('/', "."))
}

/// Map `com.acme.Fast` to `com/acme/Fast.type.json`.
pub fn entry_name_of(type_name: &str) -> String {
    format!("{}{}", type_name.replace('.', "/"), TYPE_ENTRY_SUFFIX)
}

/// Random-access view over a module archive.
pub trait ModuleArchive: Send + Sync + Debug {
    /// Human readable location used in diagnostics.
    fn location(&self) -> String;

    /// All entries in enumeration order.
    fn entries(&self) -> Result<Vec<ArchiveEntry>>;

    /// Open an entry for reading. `Ok(None)` when the entry does not exist.
    fn open(&self, name: &str) -> Result<Option<Box<dyn Read + Send>>>;

    /// Read a whole entry into memory.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(mut reader) = self.open(name)? else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| AccelError::archive(e, "read_entry", PathBuf::from(name)))?;
        Ok(Some(bytes))
    }
}

/// An unpacked archive rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self, dir: &Path, prefix: &str, entries: &mut Vec<ArchiveEntry>) -> Result<()> {
        let read_dir = fs::read_dir(dir).map_err(|e| AccelError::archive(e, "read_dir", dir))?;
        let mut children = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| AccelError::archive(e, "read_dir_entry", dir))?;
            children.push(entry.path());
        }
        // read_dir order is platform dependent
        children.sort();

        for child in children {
            let Some(file_name) = child.file_name().and_then(|n| n.to_str()) else {
                log::warn!("Skipping non UTF-8 archive entry {}", child.display());
                continue;
            };
            let name = format!("{}{}", prefix, file_name);
            if child.is_dir() {
                entries.push(ArchiveEntry {
                    name: format!("{}/", name),
                    is_dir: true,
                });
                self.walk(&child, &format!("{}/", name), entries)?;
            } else {
                entries.push(ArchiveEntry { name, is_dir: false });
            }
        }
        Ok(())
    }
}

impl ModuleArchive for DirectoryArchive {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        if !self.root.is_dir() {
            return Err(AccelError::archive(
                std::io::Error::new(std::io::ErrorKind::NotFound, "archive root is not a directory"),
                "open_archive",
                &self.root,
            ));
        }
        let mut entries = Vec::new();
        self.walk(&self.root, "", &mut entries)?;
        Ok(entries)
    }

    fn open(&self, name: &str) -> Result<Option<Box<dyn Read + Send>>> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        let file = fs::File::open(&path).map_err(|e| AccelError::archive(e, "open_entry", &path))?;
        Ok(Some(Box::new(file)))
    }
}

/// An archive held entirely in memory, enumerated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    name: String,
    entries: Vec<(ArchiveEntry, Vec<u8>)>,
}

impl MemoryArchive {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    /// Add (or replace) a file entry
    pub fn add_entry(&mut self, name: &str, bytes: impl Into<Vec<u8>>) -> &mut Self {
        let bytes = bytes.into();
        match self.entries.iter_mut().find(|(entry, _)| entry.name == name) {
            Some((_, existing)) => *existing = bytes,
            None => self.entries.push((
                ArchiveEntry {
                    name: name.to_string(),
                    is_dir: false,
                },
                bytes,
            )),
        }
        self
    }

    /// Add a directory entry
    pub fn add_directory(&mut self, name: &str) -> &mut Self {
        let name = if name.ends_with('/') { name.to_string() } else { format!("{}/", name) };
        self.entries.push((ArchiveEntry { name, is_dir: true }, Vec::new()));
        self
    }

    /// Add a type metadata entry under its conventional entry name
    pub fn add_type(&mut self, type_name: &str, json: impl Into<Vec<u8>>) -> &mut Self {
        self.add_entry(&entry_name_of(type_name), json)
    }
}

impl ModuleArchive for MemoryArchive {
    fn location(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        Ok(self.entries.iter().map(|(entry, _)| entry.clone()).collect())
    }

    fn open(&self, name: &str) -> Result<Option<Box<dyn Read + Send>>> {
        Ok(self
            .entries
            .iter()
            .find(|(entry, _)| !entry.is_dir && entry.name == name)
            .map(|(_, bytes)| Box::new(Cursor::new(bytes.clone())) as Box<dyn Read + Send>))
    }
}
