//! DRMAA v1 client, linked against the `libdrmaa` shipped with SGE
//!
//! Only one DRMAA session can be open per process. `drmaa_init` fails with
//! `DRMAA_ERRNO_ALREADY_ACTIVE_SESSION` otherwise, and that error is reported like any other
//! session error.

use std::ffi::{c_char, c_int, CStr, CString};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr;

use log::{debug, info};

use crate::sge::scheduler::{JobId, JobTemplate, Scheduler, SchedulerError, SchedulerSession};
use crate::sge::workdir::CurrentDirGuard;

const DRMAA_ERRNO_SUCCESS: c_int = 0;
const DRMAA_ERROR_STRING_BUFFER: usize = 1024;
const DRMAA_JOBNAME_BUFFER: usize = 1024;

static DRMAA_REMOTE_COMMAND: &str = "drmaa_remote_command";
static DRMAA_JOB_NAME: &str = "drmaa_job_name";
static DRMAA_NATIVE_SPECIFICATION: &str = "drmaa_native_specification";

/// Opaque `drmaa_job_template_t`
#[repr(C)]
struct RawJobTemplate {
    _private: [u8; 0],
}

#[link(name = "drmaa")]
extern "C" {
    fn drmaa_init(
        contact: *const c_char,
        error_diagnosis: *mut c_char,
        error_diag_len: usize,
    ) -> c_int;
    fn drmaa_exit(error_diagnosis: *mut c_char, error_diag_len: usize) -> c_int;
    fn drmaa_allocate_job_template(
        jt: *mut *mut RawJobTemplate,
        error_diagnosis: *mut c_char,
        error_diag_len: usize,
    ) -> c_int;
    fn drmaa_delete_job_template(
        jt: *mut RawJobTemplate,
        error_diagnosis: *mut c_char,
        error_diag_len: usize,
    ) -> c_int;
    fn drmaa_set_attribute(
        jt: *mut RawJobTemplate,
        name: *const c_char,
        value: *const c_char,
        error_diagnosis: *mut c_char,
        error_diag_len: usize,
    ) -> c_int;
    fn drmaa_run_job(
        job_id: *mut c_char,
        job_id_len: usize,
        jt: *const RawJobTemplate,
        error_diagnosis: *mut c_char,
        error_diag_len: usize,
    ) -> c_int;
}

/// Buffer DRMAA writes its error diagnosis into
struct Diagnosis {
    buffer: [c_char; DRMAA_ERROR_STRING_BUFFER],
}

impl Diagnosis {
    fn new() -> Diagnosis {
        Diagnosis { buffer: [0; DRMAA_ERROR_STRING_BUFFER] }
    }

    fn as_mut_ptr(&mut self) -> *mut c_char {
        self.buffer.as_mut_ptr()
    }

    /// Turn a DRMAA return code into a result, reading the diagnosis on failure
    fn check(&self, code: c_int, action: &str) -> Result<(), SchedulerError> {
        if code == DRMAA_ERRNO_SUCCESS {
            return Ok(());
        }
        let message = read_c_string(&self.buffer);
        Err(SchedulerError::with_code(format!("{action}: {message}"), code))
    }
}

fn read_c_string(buffer: &[c_char]) -> String {
    // SAFETY: the buffer is zero initialised and DRMAA writes at most len - 1 bytes plus a NUL
    unsafe { CStr::from_ptr(buffer.as_ptr()) }.to_string_lossy().trim().to_string()
}

fn c_string(value: &str) -> Result<CString, SchedulerError> {
    CString::new(value)
        .map_err(|_| SchedulerError::new(format!("value contains a NUL byte: {value:?}")))
}

#[derive(Default)]
pub struct DrmaaScheduler {
    /// DRMAA contact string, `None` for the default cell
    contact: Option<String>,
}

impl DrmaaScheduler {
    pub fn new(contact: Option<String>) -> DrmaaScheduler {
        DrmaaScheduler { contact }
    }
}

impl Scheduler for DrmaaScheduler {
    type Session = DrmaaSession;

    fn open_session(&self) -> Result<DrmaaSession, SchedulerError> {
        let contact = self.contact.as_deref().map(c_string).transpose()?;
        let contact_ptr = contact.as_ref().map_or(ptr::null(), |c| c.as_ptr());
        let mut diagnosis = Diagnosis::new();

        // SAFETY: contact is NUL terminated or null, diagnosis is large enough
        let code = unsafe {
            drmaa_init(contact_ptr, diagnosis.as_mut_ptr(), DRMAA_ERROR_STRING_BUFFER)
        };
        diagnosis.check(code, "drmaa_init")?;
        info!("DRMAA session initialised");
        Ok(DrmaaSession { _not_send: PhantomData })
    }
}

/// The process-wide DRMAA session
pub struct DrmaaSession {
    _not_send: PhantomData<*const ()>,
}

pub struct DrmaaTemplate {
    raw: *mut RawJobTemplate,
    working_directory: Option<PathBuf>,
}

impl DrmaaTemplate {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), SchedulerError> {
        let name_c = c_string(name)?;
        let value_c = c_string(value)?;
        let mut diagnosis = Diagnosis::new();
        debug!("Setting DRMAA attribute {name} = {value}");

        // SAFETY: raw is a live template allocated by drmaa_allocate_job_template
        let code = unsafe {
            drmaa_set_attribute(
                self.raw,
                name_c.as_ptr(),
                value_c.as_ptr(),
                diagnosis.as_mut_ptr(),
                DRMAA_ERROR_STRING_BUFFER,
            )
        };
        diagnosis.check(code, &format!("drmaa_set_attribute({name})"))
    }
}

impl JobTemplate for DrmaaTemplate {
    fn set_remote_command(&mut self, command: &Path) -> Result<(), SchedulerError> {
        let command = command
            .to_str()
            .ok_or_else(|| {
                SchedulerError::new(format!("non UTF-8 script path {}", command.display()))
            })?;
        self.set_attribute(DRMAA_REMOTE_COMMAND, command)
    }

    fn set_job_name(&mut self, name: &str) -> Result<(), SchedulerError> {
        self.set_attribute(DRMAA_JOB_NAME, name)
    }

    fn set_native_specification(&mut self, spec: &str) -> Result<(), SchedulerError> {
        self.set_attribute(DRMAA_NATIVE_SPECIFICATION, spec)
    }

    /// SGE's DRMAA resolves `-cwd` against the process working directory, which is switched to
    /// this directory for the duration of `run_job` only
    fn set_working_directory(&mut self, dir: &Path) -> Result<(), SchedulerError> {
        self.working_directory = Some(dir.to_path_buf());
        Ok(())
    }
}

impl SchedulerSession for DrmaaSession {
    type Template = DrmaaTemplate;

    fn allocate_job_template(&mut self) -> Result<DrmaaTemplate, SchedulerError> {
        let mut raw: *mut RawJobTemplate = ptr::null_mut();
        let mut diagnosis = Diagnosis::new();

        // SAFETY: raw is a valid out pointer
        let code = unsafe {
            drmaa_allocate_job_template(&mut raw, diagnosis.as_mut_ptr(), DRMAA_ERROR_STRING_BUFFER)
        };
        diagnosis.check(code, "drmaa_allocate_job_template")?;
        if raw.is_null() {
            return Err(SchedulerError::new("drmaa_allocate_job_template returned no template"));
        }
        Ok(DrmaaTemplate { raw, working_directory: None })
    }

    fn delete_job_template(&mut self, template: DrmaaTemplate) -> Result<(), SchedulerError> {
        let mut diagnosis = Diagnosis::new();

        // SAFETY: the template is consumed, so raw is never used again
        let code = unsafe {
            drmaa_delete_job_template(
                template.raw,
                diagnosis.as_mut_ptr(),
                DRMAA_ERROR_STRING_BUFFER,
            )
        };
        diagnosis.check(code, "drmaa_delete_job_template")
    }

    fn run_job(&mut self, template: &DrmaaTemplate) -> Result<JobId, SchedulerError> {
        let _cwd = match &template.working_directory {
            Some(dir) => Some(CurrentDirGuard::enter(dir).map_err(|err| {
                SchedulerError::new(format!(
                    "failed to change to script directory {}: {err}",
                    dir.display()
                ))
            })?),
            None => None,
        };

        let mut job_id: [c_char; DRMAA_JOBNAME_BUFFER] = [0; DRMAA_JOBNAME_BUFFER];
        let mut diagnosis = Diagnosis::new();

        // SAFETY: both buffers are sized as passed, raw is a live template
        let code = unsafe {
            drmaa_run_job(
                job_id.as_mut_ptr(),
                DRMAA_JOBNAME_BUFFER,
                template.raw,
                diagnosis.as_mut_ptr(),
                DRMAA_ERROR_STRING_BUFFER,
            )
        };
        diagnosis.check(code, "drmaa_run_job")?;
        Ok(JobId::new(read_c_string(&job_id)))
    }

    fn close(&mut self) -> Result<(), SchedulerError> {
        let mut diagnosis = Diagnosis::new();

        // SAFETY: called once per successful drmaa_init
        let code = unsafe { drmaa_exit(diagnosis.as_mut_ptr(), DRMAA_ERROR_STRING_BUFFER) };
        diagnosis.check(code, "drmaa_exit")
    }
}
