// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed sandbox so each integration test
// can lay out config files without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// An isolated merge sandbox backed by a [`tempfile::TempDir`].
///
/// The directory is automatically deleted when dropped.
pub struct MergeSandbox {
    root: tempfile::TempDir,
}

impl MergeSandbox {
    /// Create an empty sandbox.
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Path to the sandbox root.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Absolute path of `name` inside the sandbox.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// Write a config file into the sandbox, creating parent directories.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write config file");
        path
    }

    /// Read a file back as text.
    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).expect("read config file")
    }
}
