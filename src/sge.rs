//! Translate a resource request into an SGE submission and run it through a scheduler session

/// Render the `-pe/-cwd/-q/-l/-P` native specification
pub mod native_spec;
/// Narrow interface to the scheduler client: sessions, job templates, job ids
pub mod scheduler;
/// Session and template lifecycle around a single submission
pub mod session;
/// Turn a rejected submission into an actionable message
pub mod diagnose;
/// Scoped change of the process working directory
pub mod workdir;
/// `qsub` command line client
pub mod qsub;
/// DRMAA v1 client (`libdrmaa`)
#[cfg(feature = "drmaa")]
pub mod drmaa;
