use std::io;
use std::path::{Path, PathBuf};

/// File extensions accepted for photo uploads. Checked before any blob or
/// row is written.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Filesystem-backed blob store rooted at the uploads directory. Locators
/// are server-generated file names, never caller-supplied paths.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

/// Extract the lowercased extension if it is on the allow-list.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Some(ext)
    } else {
        None
    }
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Write bytes under a generated name, returning the locator.
    pub fn put(&self, bytes: &[u8], suggested_name: &str) -> io::Result<String> {
        let ext = allowed_extension(suggested_name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "disallowed file extension")
        })?;
        let locator = format!("{}.{}", uuid::Uuid::now_v7(), ext);
        std::fs::write(self.path_of(&locator)?, bytes)?;
        Ok(locator)
    }

    pub fn read(&self, locator: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.path_of(locator)?)
    }

    /// Remove a blob. `Ok(false)` means it was already gone; any other
    /// failure is surfaced so callers can abort before touching rows.
    pub fn delete(&self, locator: &str) -> io::Result<bool> {
        match std::fs::remove_file(self.path_of(locator)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.path_of(locator).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn count(&self) -> io::Result<usize> {
        Ok(std::fs::read_dir(&self.root)?.count())
    }

    /// Locators are plain file names; anything that would escape the root
    /// is rejected.
    fn path_of(&self, locator: &str) -> io::Result<PathBuf> {
        let is_plain_name = matches!(
            Path::new(locator).components().collect::<Vec<_>>().as_slice(),
            [std::path::Component::Normal(_)]
        );
        if locator.is_empty() || locator.contains(['/', '\\']) || !is_plain_name {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid blob locator",
            ));
        }
        Ok(self.root.join(locator))
    }
}
