use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::{debug, info};

use crate::sge::scheduler::{JobId, JobTemplate, Scheduler, SchedulerError, SchedulerSession};

/// Submits jobs by running `qsub -terse`, which prints only the job id
pub struct QsubScheduler {
    program: PathBuf,
}

impl QsubScheduler {
    pub fn new() -> QsubScheduler {
        QsubScheduler::with_program("qsub")
    }

    /// Use a specific `qsub` binary, either a path or a name looked up in `PATH`
    pub fn with_program(program: impl Into<PathBuf>) -> QsubScheduler {
        QsubScheduler { program: program.into() }
    }
}

impl Default for QsubScheduler {
    fn default() -> Self {
        QsubScheduler::new()
    }
}

impl Scheduler for QsubScheduler {
    type Session = QsubSession;

    fn open_session(&self) -> Result<QsubSession, SchedulerError> {
        let program = find_program(&self.program).ok_or_else(|| {
            SchedulerError::new(format!(
                "{} not found, is the SGE environment loaded (SGE_ROOT is {})?",
                self.program.display(),
                env::var("SGE_ROOT").unwrap_or_else(|_| "not set".to_string())
            ))
        })?;
        info!("Using {}", program.display());
        Ok(QsubSession { program })
    }
}

pub struct QsubSession {
    program: PathBuf,
}

/// Job attributes collected until `qsub` is run
#[derive(Debug, Default)]
pub struct QsubTemplate {
    remote_command: Option<PathBuf>,
    job_name: Option<String>,
    native_specification: String,
    working_directory: Option<PathBuf>,
}

impl QsubTemplate {
    /// `qsub` arguments: options first, then the script
    fn arguments(&self) -> Result<Vec<String>, SchedulerError> {
        let script = self
            .remote_command
            .as_ref()
            .ok_or_else(|| SchedulerError::new("job template has no remote command"))?;

        let mut arguments = vec!["-terse".to_string()];
        if let Some(name) = &self.job_name {
            arguments.push("-N".to_string());
            arguments.push(name.clone());
        }
        arguments.extend(self.native_specification.split_whitespace().map(str::to_string));
        arguments.push(script.display().to_string());
        Ok(arguments)
    }
}

impl JobTemplate for QsubTemplate {
    fn set_remote_command(&mut self, command: &Path) -> Result<(), SchedulerError> {
        self.remote_command = Some(command.to_path_buf());
        Ok(())
    }

    fn set_job_name(&mut self, name: &str) -> Result<(), SchedulerError> {
        self.job_name = Some(name.to_string());
        Ok(())
    }

    fn set_native_specification(&mut self, spec: &str) -> Result<(), SchedulerError> {
        self.native_specification = spec.to_string();
        Ok(())
    }

    fn set_working_directory(&mut self, dir: &Path) -> Result<(), SchedulerError> {
        self.working_directory = Some(dir.to_path_buf());
        Ok(())
    }
}

impl SchedulerSession for QsubSession {
    type Template = QsubTemplate;

    fn allocate_job_template(&mut self) -> Result<QsubTemplate, SchedulerError> {
        Ok(QsubTemplate::default())
    }

    fn delete_job_template(&mut self, template: QsubTemplate) -> Result<(), SchedulerError> {
        debug!("Dropping qsub template {:?}", template.job_name);
        Ok(())
    }

    fn run_job(&mut self, template: &QsubTemplate) -> Result<JobId, SchedulerError> {
        let arguments = template.arguments()?;

        let mut qsub = Command::new(&self.program);
        let cmd = qsub.args(&arguments);
        // -cwd resolves against qsub's own working directory
        if let Some(dir) = &template.working_directory {
            cmd.current_dir(dir);
        }
        info!("Running qsub process");
        debug!("{:?}", &cmd);

        let output = cmd
            .output()
            .map_err(|err| {
                SchedulerError::new(format!("{} start failed: {err}", self.program.display()))
            })?;
        let output = check_command_output(output)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(JobId::new(stdout.trim()))
    }

    fn close(&mut self) -> Result<(), SchedulerError> {
        debug!("Closing qsub session");
        Ok(())
    }
}

fn check_command_output(output: Output) -> Result<Output, SchedulerError> {
    let status = output.status;
    if !status.success() {
        let message = format!(
            "Stderr: {}\nStdout: {}",
            String::from_utf8_lossy(&output.stderr).trim(),
            String::from_utf8_lossy(&output.stdout).trim()
        );
        return Err(SchedulerError::with_code(message, status.code().unwrap_or(-1)));
    }
    Ok(output)
}

/// Resolve a program the way the shell would: paths are taken as is, bare names searched in `PATH`
fn find_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
