use log::{debug, info, warn};
use thiserror::Error;

use crate::request::resource::ResourceRequest;
use crate::sge::diagnose::diagnose;
use crate::sge::native_spec::NativeSpecification;
use crate::sge::scheduler::{JobId, JobTemplate, Scheduler, SchedulerError, SchedulerSession};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(
        "failed to create scheduler session for native specification \
         `{native_specification}`: {error}"
    )]
    Session {
        error: SchedulerError,
        native_specification: NativeSpecification,
    },
    #[error(
        "failed to {action} job template with native specification \
         `{native_specification}`: {error}"
    )]
    Template {
        action: &'static str,
        error: SchedulerError,
        native_specification: NativeSpecification,
    },
    #[error(
        "failed to submit job with native specification `{native_specification}`: {diagnostic}"
    )]
    Submission {
        error: SchedulerError,
        native_specification: NativeSpecification,
        /// Scheduler message, plus queue hints if queues were requested
        diagnostic: String,
    },
    #[error(
        "scheduler returned an empty job id for native specification `{native_specification}`"
    )]
    EmptyJobId {
        native_specification: NativeSpecification,
    },
}

/// A job accepted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: JobId,
    pub job_name: String,
    pub native_specification: NativeSpecification,
}

/// Submit one script through a fresh scheduler session
///
/// Lifecycle: open session, allocate template, configure it, run it. The template and then the
/// session are released when their guards go out of scope, so both are released exactly once on
/// success, on error, and on unwind. Nothing is retried.
pub fn submit<S: Scheduler>(
    scheduler: &S,
    request: &ResourceRequest,
) -> Result<Submission, SubmitError> {
    let native_specification = NativeSpecification::render(request);
    let job_name = request.job_name();
    debug!("Rendered native specification: {native_specification}");

    info!("Opening scheduler session");
    let session = scheduler.open_session().map_err(|error| SubmitError::Session {
        error,
        native_specification: native_specification.clone(),
    })?;
    let mut session = SessionGuard { session };

    let template_error = |action: &'static str| {
        let native_specification = native_specification.clone();
        move |error| SubmitError::Template { action, error, native_specification }
    };

    info!("Allocating job template");
    let mut template =
        TemplateGuard::allocate(&mut session.session).map_err(template_error("allocate"))?;

    configure(template.template_mut(), request, &job_name, &native_specification)
        .map_err(template_error("configure"))?;

    info!("Submitting {} as job {job_name}", request.script.display());
    let job_id = match template.run() {
        Ok(job_id) => job_id,
        Err(error) => {
            let diagnostic = diagnose(&error, &request.queues);
            return Err(SubmitError::Submission { error, native_specification, diagnostic });
        }
    };
    if job_id.is_empty() {
        return Err(SubmitError::EmptyJobId { native_specification });
    }

    info!("Scheduler accepted job {job_id}");
    Ok(Submission { job_id, job_name, native_specification })
}

fn configure<T: JobTemplate>(
    template: &mut T,
    request: &ResourceRequest,
    job_name: &str,
    native_specification: &NativeSpecification,
) -> Result<(), SchedulerError> {
    template.set_remote_command(&request.script)?;
    template.set_job_name(job_name)?;
    template.set_native_specification(native_specification.as_str())?;
    template.set_working_directory(request.working_directory())?;
    Ok(())
}

/// Closes the session when dropped
struct SessionGuard<S: SchedulerSession> {
    session: S,
}

impl<S: SchedulerSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        info!("Closing scheduler session");
        if let Err(err) = self.session.close() {
            warn!("Can't close scheduler session: {err}");
        }
    }
}

/// Deletes the job template when dropped, before the session it borrows is closed
struct TemplateGuard<'s, S: SchedulerSession> {
    session: &'s mut S,
    template: Option<S::Template>,
}

impl<'s, S: SchedulerSession> TemplateGuard<'s, S> {
    fn allocate(session: &'s mut S) -> Result<Self, SchedulerError> {
        let template = session.allocate_job_template()?;
        Ok(TemplateGuard { session, template: Some(template) })
    }

    // `template` is only taken in `drop`, so it is always present here
    fn template_mut(&mut self) -> &mut S::Template {
        self.template.as_mut().expect("job template is held until drop")
    }

    fn run(&mut self) -> Result<JobId, SchedulerError> {
        let template = self.template.as_ref().expect("job template is held until drop");
        self.session.run_job(template)
    }
}

impl<S: SchedulerSession> Drop for TemplateGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(template) = self.template.take() {
            info!("Deleting job template");
            if let Err(err) = self.session.delete_job_template(template) {
                warn!("Can't delete job template: {err}");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use super::{submit, SubmitError};
    use crate::request::queue::QueueList;
    use crate::request::resource::ResourceRequest;
    use crate::sge::scheduler::{JobId, JobTemplate, Scheduler, SchedulerError, SchedulerSession};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Open,
        Allocate,
        RemoteCommand(PathBuf),
        JobName(String),
        NativeSpecification(String),
        WorkingDirectory(PathBuf),
        Run,
        DeleteTemplate,
        Close,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Fail {
        Nothing,
        Open,
        Allocate,
        Configure,
        Run,
        Panic,
        EmptyId,
    }

    type Calls = Rc<RefCell<Vec<Call>>>;

    struct MockScheduler {
        calls: Calls,
        fail: Fail,
    }

    struct MockSession {
        calls: Calls,
        fail: Fail,
    }

    struct MockTemplate {
        calls: Calls,
        fail: Fail,
    }

    impl MockScheduler {
        fn new(fail: Fail) -> MockScheduler {
            MockScheduler { calls: Rc::new(RefCell::new(Vec::new())), fail }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn count(&self, call: &Call) -> usize {
            self.calls.borrow().iter().filter(|c| *c == call).count()
        }
    }

    impl Scheduler for MockScheduler {
        type Session = MockSession;

        fn open_session(&self) -> Result<MockSession, SchedulerError> {
            self.calls.borrow_mut().push(Call::Open);
            if self.fail == Fail::Open {
                return Err(SchedulerError::new("no qmaster"));
            }
            Ok(MockSession { calls: self.calls.clone(), fail: self.fail })
        }
    }

    impl SchedulerSession for MockSession {
        type Template = MockTemplate;

        fn allocate_job_template(&mut self) -> Result<MockTemplate, SchedulerError> {
            self.calls.borrow_mut().push(Call::Allocate);
            if self.fail == Fail::Allocate {
                return Err(SchedulerError::new("out of memory"));
            }
            Ok(MockTemplate { calls: self.calls.clone(), fail: self.fail })
        }

        fn delete_job_template(&mut self, _template: MockTemplate) -> Result<(), SchedulerError> {
            self.calls.borrow_mut().push(Call::DeleteTemplate);
            Ok(())
        }

        fn run_job(&mut self, _template: &MockTemplate) -> Result<JobId, SchedulerError> {
            self.calls.borrow_mut().push(Call::Run);
            match self.fail {
                Fail::Run => Err(SchedulerError::with_code("Job was rejected", 13)),
                Fail::Panic => panic!("scheduler client crashed"),
                Fail::EmptyId => Ok(JobId::new(" \n")),
                _ => Ok(JobId::new("4242")),
            }
        }

        fn close(&mut self) -> Result<(), SchedulerError> {
            self.calls.borrow_mut().push(Call::Close);
            // release errors are only logged
            Err(SchedulerError::new("already closed"))
        }
    }

    impl JobTemplate for MockTemplate {
        fn set_remote_command(&mut self, command: &Path) -> Result<(), SchedulerError> {
            self.calls.borrow_mut().push(Call::RemoteCommand(command.to_path_buf()));
            Ok(())
        }

        fn set_job_name(&mut self, name: &str) -> Result<(), SchedulerError> {
            self.calls.borrow_mut().push(Call::JobName(name.to_string()));
            Ok(())
        }

        fn set_native_specification(&mut self, spec: &str) -> Result<(), SchedulerError> {
            self.calls.borrow_mut().push(Call::NativeSpecification(spec.to_string()));
            if self.fail == Fail::Configure {
                return Err(SchedulerError::new("invalid attribute value"));
            }
            Ok(())
        }

        fn set_working_directory(&mut self, dir: &Path) -> Result<(), SchedulerError> {
            self.calls.borrow_mut().push(Call::WorkingDirectory(dir.to_path_buf()));
            Ok(())
        }
    }

    fn request() -> ResourceRequest {
        let mut request = ResourceRequest::new(PathBuf::from("/data/run/L2_1_1.sh"));
        request.cpus = 4;
        request.virtual_memory_gib = Some(10);
        request
    }

    fn assert_released_once(scheduler: &MockScheduler) {
        assert_eq!(scheduler.count(&Call::DeleteTemplate), 1);
        assert_eq!(scheduler.count(&Call::Close), 1);
        let calls = scheduler.calls();
        assert_eq!(&calls[calls.len() - 2..], &[Call::DeleteTemplate, Call::Close]);
    }

    #[test]
    fn test_submit() {
        let scheduler = MockScheduler::new(Fail::Nothing);
        let submission = submit(&scheduler, &request()).unwrap();

        assert_eq!(submission.job_id.as_str(), "4242");
        assert_eq!(submission.job_name, "L2_1_1.sh");
        assert_eq!(
            submission.native_specification.as_str(),
            "-pe smp 4 -cwd -b n -l h_vmem=10g"
        );
        assert_eq!(
            scheduler.calls(),
            vec![
                Call::Open,
                Call::Allocate,
                Call::RemoteCommand(PathBuf::from("/data/run/L2_1_1.sh")),
                Call::JobName("L2_1_1.sh".to_string()),
                Call::NativeSpecification("-pe smp 4 -cwd -b n -l h_vmem=10g".to_string()),
                Call::WorkingDirectory(PathBuf::from("/data/run")),
                Call::Run,
                Call::DeleteTemplate,
                Call::Close,
            ]
        );
    }

    #[test]
    fn test_session_failure_releases_nothing() {
        let scheduler = MockScheduler::new(Fail::Open);
        let err = submit(&scheduler, &request()).unwrap_err();
        match &err {
            SubmitError::Session { native_specification, .. } => {
                assert_eq!(native_specification.as_str(), "-pe smp 4 -cwd -b n -l h_vmem=10g");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("no qmaster"));
        assert!(err.to_string().contains("`-pe smp 4 -cwd -b n -l h_vmem=10g`"));
        assert_eq!(scheduler.calls(), vec![Call::Open]);
    }

    #[test]
    fn test_template_failure_closes_session() {
        let scheduler = MockScheduler::new(Fail::Allocate);
        let err = submit(&scheduler, &request()).unwrap_err();
        assert!(matches!(err, SubmitError::Template { action: "allocate", .. }));
        assert!(err.to_string().contains("`-pe smp 4 -cwd -b n -l h_vmem=10g`"));
        assert_eq!(scheduler.calls(), vec![Call::Open, Call::Allocate, Call::Close]);
    }

    #[test]
    fn test_configure_failure_releases_both() {
        let scheduler = MockScheduler::new(Fail::Configure);
        let err = submit(&scheduler, &request()).unwrap_err();
        match &err {
            SubmitError::Template { action, error, native_specification } => {
                assert_eq!(*action, "configure");
                assert_eq!(error.message, "invalid attribute value");
                assert_eq!(native_specification.as_str(), "-pe smp 4 -cwd -b n -l h_vmem=10g");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "failed to configure job template with native specification \
             `-pe smp 4 -cwd -b n -l h_vmem=10g`: invalid attribute value"
        );
        assert_eq!(scheduler.count(&Call::Run), 0);
        assert_released_once(&scheduler);
    }

    #[test]
    fn test_run_failure_releases_both() {
        let scheduler = MockScheduler::new(Fail::Run);
        let err = submit(&scheduler, &request()).unwrap_err();
        match &err {
            SubmitError::Submission { error, native_specification, diagnostic } => {
                assert_eq!(error.code, Some(13));
                assert_eq!(native_specification.as_str(), "-pe smp 4 -cwd -b n -l h_vmem=10g");
                assert_eq!(diagnostic, "Job was rejected (code 13)");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("-pe smp 4 -cwd -b n -l h_vmem=10g"));
        assert_released_once(&scheduler);
    }

    #[test]
    fn test_run_failure_with_queue_has_hints() {
        let scheduler = MockScheduler::new(Fail::Run);
        let mut request = request();
        request.queues = QueueList::parse("scv.q,sci.q");
        let err = submit(&scheduler, &request).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Queue specified: scv.q,sci.q"));
        assert!(message.contains("qconf -sq scv.q,sci.q"));
        assert_released_once(&scheduler);
    }

    #[test]
    fn test_empty_job_id() {
        let scheduler = MockScheduler::new(Fail::EmptyId);
        let err = submit(&scheduler, &request()).unwrap_err();
        assert!(matches!(err, SubmitError::EmptyJobId { .. }));
        assert_released_once(&scheduler);
    }

    #[test]
    fn test_panic_releases_both() {
        let scheduler = MockScheduler::new(Fail::Panic);
        let request = request();
        let result = catch_unwind(AssertUnwindSafe(|| submit(&scheduler, &request)));
        assert!(result.is_err());
        assert_released_once(&scheduler);
    }
}
