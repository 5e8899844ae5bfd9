//! The run log: a tee between the console and `profile.log`.
//!
//! Operator-facing progress lines go to stdout and the log file; build tool
//! output is written to the log file only, so the console stays readable
//! while the log keeps a complete record of every invocation.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

/// Shared handle to the run log file.
///
/// Cloning is cheap; all clones append to the same file. Every line is
/// flushed immediately so the log is complete at invocation boundaries
/// even if the process is interrupted.
#[derive(Debug, Clone)]
pub struct RunLog {
    file: Arc<Mutex<File>>,
    path: PathBuf,
}

impl RunLog {
    /// Creates (truncating) the log file and writes the run header.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        writeln!(
            file,
            "Run started at {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        file.flush()?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Writes a progress line to both the console and the log file.
    pub fn output(&self, line: &str) {
        println!("{line}");
        self.append(line);
    }

    /// Writes a line to the log file only.
    pub fn detail(&self, line: &str) {
        self.append(line);
    }

    /// Path of the underlying log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) {
        // A poisoned lock means another writer panicked mid-line; the log
        // is best-effort at that point, keep writing.
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(file, "{line}");
        let _ = file.flush();
    }
}
