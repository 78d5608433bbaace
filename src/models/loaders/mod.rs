pub mod job_loader;

pub use job_loader::{extract_invoice_number, load_jobs, parse_job_file, rows_to_jobs, JobRow};
