use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::Backend;
use crate::sge::native_spec::NativeSpecification;
use crate::sge::scheduler::JobId;
use crate::sge::session::Submission;

/// Machine readable summary of a submitted job, printed with `--json`
#[derive(Debug, Serialize)]
pub struct SubmissionReceipt {
    pub job_id: JobId,
    pub job_name: String,
    pub script: PathBuf,
    pub native_specification: NativeSpecification,
    pub backend: Backend,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionReceipt {
    pub fn new(submission: Submission, script: PathBuf, backend: Backend) -> SubmissionReceipt {
        SubmissionReceipt {
            job_id: submission.job_id,
            job_name: submission.job_name,
            script,
            native_specification: submission.native_specification,
            backend,
            submitted_at: Utc::now(),
        }
    }
}
