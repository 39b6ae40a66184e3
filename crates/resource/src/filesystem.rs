//! Filesystem-backed resource provider.
//!
//! Names are resolved relative to a base directory and must stay inside it:
//! absolute names and names that climb out with `..` are refused.

use log::debug;
use quire_traits::{ResourceError, ResourceProvider, SharedResourceData};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub struct FilesystemResourceProvider {
    base_path: PathBuf,
    canonical_base: Option<PathBuf>,
}

impl FilesystemResourceProvider {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        let base = base_path.as_ref().to_path_buf();
        let canonical = base.canonicalize().ok();
        Self {
            base_path: base,
            canonical_base: canonical,
        }
    }

    /// Provider rooted at the directory containing `file`, used for a
    /// configuration whose relative references point next to it.
    pub fn for_file<P: AsRef<Path>>(file: P) -> Self {
        let dir = file
            .as_ref()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::new(dir)
    }

    pub fn base(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, ResourceError> {
        let blocked = || ResourceError::NotFound(format!("{} (outside base directory)", name));
        let relative = Path::new(name);
        if relative.is_absolute() {
            return Err(blocked());
        }

        let full_path = self.base_path.join(relative);
        if let Ok(canonical) = full_path.canonicalize()
            && let Some(base) = &self.canonical_base
        {
            return if canonical.starts_with(base) {
                Ok(canonical)
            } else {
                Err(blocked())
            };
        }

        if relative.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(blocked());
        }
        Ok(full_path)
    }
}

impl ResourceProvider for FilesystemResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let full_path = self.resolve(path)?;
        debug!("Loading resource '{}' from {}", path, full_path.display());
        std::fs::read(&full_path).map(Arc::new).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResourceError::NotFound(path.to_string())
            } else {
                ResourceError::LoadFailed {
                    path: path.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn base_path(&self) -> Option<&str> {
        self.base_path.to_str()
    }

    fn name(&self) -> &'static str {
        "FilesystemResourceProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_loads_template_from_base_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("form.pdf"), b"%PDF-1.5 stub").unwrap();

        let provider = FilesystemResourceProvider::new(dir.path());
        let data = provider.load("form.pdf").unwrap();
        assert_eq!(&*data, b"%PDF-1.5 stub");
        assert!(provider.exists("form.pdf"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let provider = FilesystemResourceProvider::new(dir.path());
        assert!(matches!(
            provider.load("annex.xml"),
            Err(ResourceError::NotFound(_))
        ));
        assert!(!provider.exists("annex.xml"));
    }

    #[test]
    fn test_directories_do_not_exist_as_resources() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("templates")).unwrap();
        let provider = FilesystemResourceProvider::new(dir.path());
        assert!(!provider.exists("templates"));
    }

    #[test]
    fn test_for_file_uses_parent_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("logo.png"), b"png").unwrap();
        let config = dir.path().join("invoice.xml");

        let provider = FilesystemResourceProvider::for_file(&config);
        assert_eq!(provider.base(), dir.path());
        assert!(provider.exists("logo.png"));

        let bare = FilesystemResourceProvider::for_file("invoice.xml");
        assert_eq!(bare.base(), Path::new("."));
    }

    #[test]
    fn test_load_text_from_disk() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("annex.xml"), "<document/>").unwrap();
        let provider = FilesystemResourceProvider::new(dir.path());
        assert_eq!(provider.load_text("annex.xml").unwrap(), "<document/>");
    }

    #[test]
    fn test_blocks_escape_from_base() {
        let dir = tempdir().unwrap();
        let provider = FilesystemResourceProvider::new(dir.path());

        assert!(provider.load("../../../etc/passwd").is_err());
        assert!(provider.load("/etc/passwd").is_err());
        assert!(!provider.exists(".."));
        assert!(!provider.exists("foo/../../../bar"));
        assert!(!provider.exists("./../../secret"));
    }

    #[test]
    fn test_allows_nested_paths() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("templates");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("page2.pdf"), b"nested").unwrap();

        let provider = FilesystemResourceProvider::new(dir.path());
        assert!(provider.exists("templates/page2.pdf"));
        assert_eq!(&*provider.load("templates/page2.pdf").unwrap(), b"nested");
        assert!(provider.base_path().is_some());
    }
}
