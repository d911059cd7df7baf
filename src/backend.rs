use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

/// Scheduler client used to submit the job
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Run the `qsub` command
    Qsub,
    /// Talk to SGE through libdrmaa (needs the `drmaa` feature)
    Drmaa,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Backend::Qsub => write!(f, "qsub"),
            Backend::Drmaa => write!(f, "drmaa"),
        }
    }
}
