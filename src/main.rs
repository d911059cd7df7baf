use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use qsubmit::backend::Backend;
use qsubmit::receipt::SubmissionReceipt;
use qsubmit::sge::qsub::QsubScheduler;
use qsubmit::{
    submit, ConfigurationError, NativeSpecification, QueueList, ResourceRequest, Submission,
};

/// Submit a single task to an SGE cluster
#[derive(Parser, Debug)]
#[command(name = "qsubmit", version)]
struct Args {
    /// Input shell script file
    #[arg(short = 'i', long = "input", alias = "i", value_name = "SCRIPT")]
    input: PathBuf,

    /// Number of CPUs per task
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    cpu: u32,

    /// Memory in GB per task (only used if explicitly set)
    #[arg(long, value_name = "GB")]
    mem: Option<u32>,

    /// Virtual memory in GB per task (only used if explicitly set)
    #[arg(long = "h_vmem", value_name = "GB")]
    h_vmem: Option<u32>,

    /// Queue name(s), comma-separated for multiple queues, empty for the cluster default
    #[arg(long, default_value = "scv.q,sci.q", env = "QSUBMIT_QUEUE")]
    queue: String,

    /// SGE project name for resource quota management
    #[arg(short = 'P', long = "sge-project", env = "QSUBMIT_PROJECT")]
    sge_project: Option<String>,

    /// Scheduler client used for the submission
    #[arg(long, value_enum, default_value_t = Backend::Qsub, env = "QSUBMIT_BACKEND")]
    backend: Backend,

    /// Print the native specification and qsub command line without submitting
    #[arg(long)]
    dry_run: bool,

    /// Print a JSON receipt instead of the bare job id
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    info!("Submitting {} with the {} backend", args.input.display(), args.backend);

    let (status, message) = outcome(run(args));
    if let Some(message) = message {
        eprintln!("{message}");
    }
    ExitCode::from(status)
}

/// Exit status and the stderr message for a finished run
fn outcome(result: Result<()>) -> (u8, Option<String>) {
    match result {
        Ok(()) => (0, None),
        Err(err) => (1, Some(format!("Error: {err:#}"))),
    }
}

fn run(args: Args) -> Result<()> {
    let request = build_request(&args)?;

    if args.dry_run {
        info!("--dry-run set, not contacting the scheduler");
        println!("{}", dry_run_text(&request)?);
        return Ok(());
    }

    let submission = submit_with(args.backend, &request)
        .with_context(|| format!("could not submit {}", request.script.display()))?;

    if args.json {
        let receipt = SubmissionReceipt::new(submission, request.script, args.backend);
        println!("{}", serde_json::to_string_pretty(&receipt)?);
    } else {
        println!("{}", submission.job_id);
    }
    Ok(())
}

fn build_request(args: &Args) -> Result<ResourceRequest> {
    let mut request = ResourceRequest::for_script(&args.input, args.cpu)?;
    request.memory_gib = args.mem;
    request.virtual_memory_gib = args.h_vmem;
    request.queues = QueueList::parse(&args.queue);
    Ok(request.with_project(args.sge_project.as_deref())?)
}

fn submit_with(backend: Backend, request: &ResourceRequest) -> Result<Submission> {
    let submission = match backend {
        Backend::Qsub => submit(&QsubScheduler::new(), request)?,
        #[cfg(feature = "drmaa")]
        Backend::Drmaa => submit(&qsubmit::sge::drmaa::DrmaaScheduler::default(), request)?,
        #[cfg(not(feature = "drmaa"))]
        Backend::Drmaa => {
            return Err(ConfigurationError::BackendUnavailable(backend.to_string()).into())
        }
    };
    Ok(submission)
}

/// The native specification and a `qsub` command line that can be pasted into a shell
fn dry_run_text(request: &ResourceRequest) -> Result<String> {
    let spec = NativeSpecification::render(request);
    let dir = request.working_directory().display().to_string();
    let script = request.script.display().to_string();
    Ok(format!(
        "native specification: {spec}\ncd {} && qsub -N {} {spec} {}",
        quote(&dir)?,
        quote(&request.job_name())?,
        quote(&script)?
    ))
}

fn quote(value: &str) -> Result<String> {
    shlex::try_quote(value)
        .map(|quoted| quoted.into_owned())
        .map_err(|err| anyhow::anyhow!("can't quote {value:?} for the shell: {err:?}"))
}
