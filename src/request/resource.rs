use std::io;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::request::queue::QueueList;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Script file does not exist: {}", .0.display())]
    ScriptNotFound(PathBuf),
    #[error("Script is not a regular file: {}", .0.display())]
    NotAFile(PathBuf),
    #[error("Could not get absolute path for script {}: {source}", .path.display())]
    AbsolutePath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CPU count must be at least 1")]
    InvalidCpuCount,
    #[error("SGE project name must not contain whitespace: {0:?}")]
    InvalidProject(String),
    #[error("Backend {0} is not available in this build")]
    BackendUnavailable(String),
}

/// Everything needed to submit one script to SGE
///
/// `memory_gib` and `virtual_memory_gib` are `Some` only if the caller asked for them; an
/// explicit zero is still rendered into the native specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    /// Absolute path to the script, used as the remote command
    pub script: PathBuf,
    pub cpus: u32,
    pub memory_gib: Option<u32>,
    pub virtual_memory_gib: Option<u32>,
    pub queues: QueueList,
    pub project: Option<String>,
}

impl ResourceRequest {
    /// A request for one CPU with no resource limits, queue or project
    pub fn new(script: PathBuf) -> ResourceRequest {
        ResourceRequest {
            script,
            cpus: 1,
            memory_gib: None,
            virtual_memory_gib: None,
            queues: QueueList::default(),
            project: None,
        }
    }

    /// Check the script on disk and build a request for its absolute path
    pub fn for_script(script: &Path, cpus: u32) -> Result<ResourceRequest, ConfigurationError> {
        if cpus == 0 {
            return Err(ConfigurationError::InvalidCpuCount);
        }
        if !script.exists() {
            return Err(ConfigurationError::ScriptNotFound(script.to_path_buf()));
        }
        if !script.is_file() {
            return Err(ConfigurationError::NotAFile(script.to_path_buf()));
        }

        let absolute =
            std::path::absolute(script).map_err(|source| ConfigurationError::AbsolutePath {
                path: script.to_path_buf(),
                source,
            })?;
        info!("Resolved script {} to {}", script.display(), absolute.display());

        let mut request = ResourceRequest::new(absolute);
        request.cpus = cpus;
        Ok(request)
    }

    /// Empty or whitespace-only project names count as no project
    ///
    /// The project is a single token of the native specification, so names with inner
    /// whitespace are rejected.
    pub fn with_project(
        mut self,
        project: Option<&str>,
    ) -> Result<ResourceRequest, ConfigurationError> {
        let project = project.map(str::trim).filter(|p| !p.is_empty());
        if let Some(name) = project {
            if name.chars().any(char::is_whitespace) {
                return Err(ConfigurationError::InvalidProject(name.to_string()));
            }
        }
        self.project = project.map(str::to_string);
        Ok(self)
    }

    /// The script's file name, extension included
    ///
    /// SGE names the job output files after it: `<job name>.o<job id>` and `<job name>.e<job id>`.
    pub fn job_name(&self) -> String {
        match self.script.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.script.display().to_string(),
        }
    }

    /// Directory the job runs in, the one containing the script
    pub fn working_directory(&self) -> &Path {
        self.script.parent().unwrap_or(Path::new("/"))
    }
}
