use std::fmt;

use serde::Serialize;

use crate::request::resource::ResourceRequest;

/// Parallel environment used for the CPU request (`-pe smp <cpus>`)
static PARALLEL_ENVIRONMENT: &str = "smp";

/// A rendered SGE native specification, e.g. `-pe smp 4 -cwd -b n -l h_vmem=10g`
///
/// Rendering is deterministic and the flag order is fixed:
/// 1. `-pe smp <cpus>`
/// 2. `-cwd -b n` (run in the current directory, script is run through a shell)
/// 3. `-q <queues>` if any queue was requested
/// 4. `-l vf=<n>g,h_vmem=<n>g` with only the explicitly requested limits, in that order
/// 5. `-P <project>` if a project was requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NativeSpecification(String);

impl NativeSpecification {
    pub fn render(request: &ResourceRequest) -> NativeSpecification {
        let mut spec = format!("-pe {PARALLEL_ENVIRONMENT} {} -cwd -b n", request.cpus);

        if !request.queues.is_empty() {
            spec.push_str(&format!(" -q {}", request.queues));
        }

        let limits = resource_limits(request);
        if !limits.is_empty() {
            spec.push_str(&format!(" -l {}", limits.join(",")));
        }

        if let Some(project) = request.project.as_deref().filter(|p| !p.is_empty()) {
            spec.push_str(&format!(" -P {project}"));
        }

        NativeSpecification(spec)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Individual command line arguments, as `qsub` expects them
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.0.split_whitespace()
    }
}

impl fmt::Display for NativeSpecification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `name=<n>g` terms for each explicitly requested limit
///
/// SGE's virtual free (`vf`) carries the memory request, `h_vmem` the hard virtual memory limit.
fn resource_limits(request: &ResourceRequest) -> Vec<String> {
    let mut limits = Vec::new();
    if let Some(memory) = request.memory_gib {
        limits.push(format!("vf={memory}g"));
    }
    if let Some(virtual_memory) = request.virtual_memory_gib {
        limits.push(format!("h_vmem={virtual_memory}g"));
    }
    limits
}
