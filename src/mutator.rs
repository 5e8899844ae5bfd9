//! Source mutation engine.
//!
//! A mutator simulates incremental developer changes: before each warm-up
//! and measured build it rewrites the target file as a pure function of the
//! original bytes and an invocation counter, so two invocations never see
//! the same contents and the original can always be restored exactly.
//!
//! Acquisition is scoped: the original bytes are read once, and the guard
//! restores them on every exit path. `revert()` reports errors; `Drop` is
//! the backstop for panics and early returns.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::schema::{MutatorKind, MutatorSpec};
use crate::error::{Error, Result};

/// Computes the mutated file contents for one invocation.
///
/// Pure: the result depends only on the original bytes, the kind, and the
/// counter, which makes reverting a plain write of the original.
#[must_use]
pub fn mutate(kind: MutatorKind, original: &[u8], counter: usize) -> Vec<u8> {
    match kind {
        MutatorKind::AbiJava => {
            let edit = format!("public void _m{counter}() {{ }}\n");
            insert_at(original, last_byte(original, b'}'), edit.as_bytes())
        }
        MutatorKind::NonAbiJava => {
            let edit = format!("System.out.println(\"_m{counter}\");\n");
            insert_at(original, second_last_byte(original, b'}'), edit.as_bytes())
        }
        MutatorKind::AndroidResource => {
            let edit = format!(
                "<string name=\"mutated_string_{counter}\">mutated string {counter}</string>\n"
            );
            insert_at(original, find(original, b"</resources>"), edit.as_bytes())
        }
        MutatorKind::AndroidResourceValue => {
            let edit = format!(" mutated {counter}");
            insert_at(original, find(original, b"</string>"), edit.as_bytes())
        }
    }
}

/// A held mutation target: remembers the original bytes and guarantees
/// their restoration.
#[derive(Debug)]
pub struct Mutator {
    kind: MutatorKind,
    path: PathBuf,
    original: Vec<u8>,
    reverted: bool,
}

impl Mutator {
    /// Reads and remembers the original contents of the target file.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error when the target does not exist.
    pub fn acquire(project_dir: &Path, spec: &MutatorSpec) -> Result<Self> {
        let path = project_dir.join(&spec.target);
        let original = std::fs::read(&path).map_err(|err| {
            Error::Config(format!(
                "Cannot read source file {} to apply changes to: {err}",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), bytes = original.len(), "acquired mutation target");
        Ok(Self {
            kind: spec.kind,
            path,
            original,
            reverted: false,
        })
    }

    /// Writes the mutated variant for the given invocation counter.
    pub fn apply(&mut self, counter: usize) -> std::io::Result<()> {
        self.reverted = false;
        std::fs::write(&self.path, mutate(self.kind, &self.original, counter))
    }

    /// Restores exactly the original bytes.
    pub fn revert(&mut self) -> std::io::Result<()> {
        if !self.reverted {
            std::fs::write(&self.path, &self.original)?;
            self.reverted = true;
        }
        Ok(())
    }

    /// The file being mutated.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.path
    }
}

impl Drop for Mutator {
    fn drop(&mut self) {
        if !self.reverted {
            if let Err(err) = std::fs::write(&self.path, &self.original) {
                warn!(path = %self.path.display(), %err, "failed to restore mutated file");
            }
        }
    }
}

fn insert_at(original: &[u8], position: Option<usize>, edit: &[u8]) -> Vec<u8> {
    let position = position.unwrap_or(original.len());
    let mut result = Vec::with_capacity(original.len() + edit.len());
    result.extend_from_slice(&original[..position]);
    result.extend_from_slice(edit);
    result.extend_from_slice(&original[position..]);
    result
}

fn last_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().rposition(|&b| b == needle)
}

fn second_last_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    let last = last_byte(haystack, needle)?;
    last_byte(&haystack[..last], needle)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
