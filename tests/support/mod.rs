//! Test support utilities for flux-repo integration tests.
//!
//! Provides reusable test environment setup and helper commands.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;
pub mod skip;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::path::{Path, PathBuf};

use age::secrecy::ExposeSecret;
use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// Each test gets its own temporary project dir and home dir.
/// No process-global state is mutated. Child processes use `.current_dir()`
/// so tests can safely run in parallel.
pub struct Test {
    /// Temporary directory for the manifests and outputs
    pub dir: TempDir,
    /// Temporary home directory
    pub home: TempDir,
}

impl Test {
    /// Create a new empty test environment.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = TempDir::new().expect("failed to create temp home");

        Self { dir, home }
    }

    /// Create a test environment with an age identity at the default
    /// location (`~/.flux-repo/identity.key`).
    ///
    /// Returns the environment and the identity's public key.
    pub fn with_identity() -> (Self, String) {
        let t = Self::new();
        let recipient = t.write_identity(&t.home.path().join(".flux-repo").join("identity.key"));
        (t, recipient)
    }

    /// Generate an age identity, write it to `path`, and return its public key.
    pub fn write_identity(&self, path: &Path) -> String {
        let identity = age::x25519::Identity::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create identity dir");
        }
        std::fs::write(
            path,
            format!(
                "# public key: {}\n{}\n",
                identity.to_public(),
                identity.to_string().expose_secret()
            ),
        )
        .expect("failed to write identity");
        identity.to_public().to_string()
    }

    /// Absolute path of a file in the project dir.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a file in the project dir, creating parent directories.
    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create dir");
        }
        std::fs::write(&path, contents).expect("failed to write file");
        path
    }

    /// Read a file from the project dir.
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name))
            .unwrap_or_else(|e| panic!("failed to read {}: {}", name, e))
    }
}
