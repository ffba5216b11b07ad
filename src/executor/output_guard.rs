use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Removes a partially written output unless the encode is kept.
///
/// Armed right after the encoder is spawned, so a file that existed before
/// a failed spawn is never touched. Dropping the guard (executor future
/// dropped mid-encode) removes the file as well.
#[derive(Debug)]
pub(crate) struct PartialOutput {
    path: PathBuf,
    armed: bool,
}

impl PartialOutput {
    pub(crate) fn arm(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    /// The output is complete; leave it in place
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }

    /// Remove the output now
    pub(crate) fn discard(mut self) {
        self.armed = false;
        remove(&self.path);
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.armed {
            remove(&self.path);
        }
    }
}

fn remove(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}
