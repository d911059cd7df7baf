use std::fmt;
use std::path::Path;

use serde::Serialize;

/// An error reported by the scheduler client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerError {
    pub message: String,
    /// Native error code, if the client has one (DRMAA errno, qsub exit status)
    pub code: Option<i32>,
}

impl SchedulerError {
    pub fn new(message: impl Into<String>) -> SchedulerError {
        SchedulerError { message: message.into(), code: None }
    }

    pub fn with_code(message: impl Into<String>, code: i32) -> SchedulerError {
        SchedulerError { message: message.into(), code: Some(code) }
    }
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for SchedulerError {}

/// Identifier the scheduler assigned to a submitted job, not interpreted any further
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> JobId {
        JobId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scheduler client able to open submission sessions
pub trait Scheduler {
    type Session: SchedulerSession;

    /// Fails if the scheduler can't be reached at all
    fn open_session(&self) -> Result<Self::Session, SchedulerError>;
}

/// One open session with the scheduler
///
/// Every allocated template must be handed back to `delete_job_template`, and `close` must be
/// called exactly once when the session is no longer needed.
pub trait SchedulerSession {
    type Template: JobTemplate;

    fn allocate_job_template(&mut self) -> Result<Self::Template, SchedulerError>;

    fn delete_job_template(&mut self, template: Self::Template) -> Result<(), SchedulerError>;

    fn run_job(&mut self, template: &Self::Template) -> Result<JobId, SchedulerError>;

    fn close(&mut self) -> Result<(), SchedulerError>;
}

/// Job attributes set before submission
pub trait JobTemplate {
    fn set_remote_command(&mut self, command: &Path) -> Result<(), SchedulerError>;

    fn set_job_name(&mut self, name: &str) -> Result<(), SchedulerError>;

    fn set_native_specification(&mut self, spec: &str) -> Result<(), SchedulerError>;

    /// Directory `-cwd` resolves to when the job is submitted
    fn set_working_directory(&mut self, dir: &Path) -> Result<(), SchedulerError>;
}
