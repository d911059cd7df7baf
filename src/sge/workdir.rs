use std::env;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

/// Changes the process working directory and changes it back when dropped
///
/// SGE resolves `-cwd` against the working directory of the submitting process. Clients that
/// submit in-process (DRMAA) hold one of these around the submit call only, so the change never
/// leaks past it, even if the call unwinds.
pub struct CurrentDirGuard {
    original: PathBuf,
}

impl CurrentDirGuard {
    pub fn enter(dir: &Path) -> io::Result<CurrentDirGuard> {
        let original = env::current_dir()?;
        env::set_current_dir(dir)?;
        info!("Changed working directory from {} to {}", original.display(), dir.display());
        Ok(CurrentDirGuard { original })
    }

    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for CurrentDirGuard {
    fn drop(&mut self) {
        match env::set_current_dir(&self.original) {
            Ok(_) => info!("Restored working directory {}", self.original.display()),
            Err(err) => warn!("Can't restore working directory {}: {err}", self.original.display()),
        }
    }
}
