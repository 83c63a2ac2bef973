//! Filesystem probe used by the reviewer.

use std::path::Path;

/// Existence checks against some filesystem.
pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// The local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_filesystem_sees_real_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("out.bin");
        assert!(!LocalFilesystem.exists(&file));
        std::fs::write(&file, b"1").expect("write");
        assert!(LocalFilesystem.exists(&file));
    }
}
