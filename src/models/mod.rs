pub mod credentials;
pub mod job;
pub mod loaders;
pub mod outcome;
pub mod provider;
pub mod report;

pub use credentials::Credentials;
pub use job::{Job, JobFlags};
pub use loaders::{extract_invoice_number, load_jobs, parse_job_file, JobRow};
pub use outcome::{JobOutcome, JobStatus};
pub use provider::ProviderId;
pub use report::{ExecutionReport, ExecutionStatus, OutcomeCounts};
