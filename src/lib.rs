//! Submit a single shell script to an SGE cluster
//!
//! A [`ResourceRequest`] is rendered into an SGE native specification and submitted through a
//! short-lived scheduler session, which is always released before [`submit`] returns.

pub mod backend;
pub mod receipt;
pub mod request;
pub mod sge;

pub use request::queue::QueueList;
pub use request::resource::{ConfigurationError, ResourceRequest};
pub use sge::native_spec::NativeSpecification;
pub use sge::scheduler::{JobId, Scheduler, SchedulerError};
pub use sge::session::{submit, SubmitError, Submission};
