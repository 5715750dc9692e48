//! Program image resolution.
//!
//! START names its service image with a NUL-terminated string in bus memory;
//! an [`ImageLoader`] turns that name into bytes. The filesystem loader
//! confines names to a base directory; the in-memory loader backs embedded
//! service catalogs and tests.

use crate::error::ImageError;
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

pub trait ImageLoader: Send {
    fn load(&self, name: &str) -> Result<Vec<u8>, ImageError>;
}

/// Loads images from files under a base directory.
///
/// Names must be plain relative paths: absolute names, `..` components, and
/// other non-normal path components are rejected before touching the
/// filesystem.
pub struct DirImageLoader {
    base_dir: PathBuf,
}

impl DirImageLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn sanitize(&self, name: &str) -> Result<PathBuf, ImageError> {
        let path = Path::new(name);
        if name.is_empty()
            || path.is_absolute()
            || path
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(ImageError::PathInvalid(name.to_string()));
        }
        Ok(self.base_dir.join(path))
    }
}

impl ImageLoader for DirImageLoader {
    fn load(&self, name: &str) -> Result<Vec<u8>, ImageError> {
        let path = self.sanitize(name)?;
        std::fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ImageError::NotFound(name.to_string()),
            _ => ImageError::Io {
                name: name.to_string(),
                source: err,
            },
        })
    }
}

/// In-memory image catalog.
#[derive(Default)]
pub struct MemImageLoader {
    images: HashMap<String, Vec<u8>>,
}

impl MemImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, image: Vec<u8>) {
        self.images.insert(name.into(), image);
    }
}

impl ImageLoader for MemImageLoader {
    fn load(&self, name: &str) -> Result<Vec<u8>, ImageError> {
        self.images
            .get(name)
            .cloned()
            .ok_or_else(|| ImageError::NotFound(name.to_string()))
    }
}
