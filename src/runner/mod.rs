pub mod executor;
pub mod pool;
pub mod reporter;
pub mod status;
pub mod types;

pub use executor::{CaseRunner, append_query, decode_json_body, parse_headers};
pub use pool::{FilePool, PoolOptions, merge_results};
pub use reporter::CaseReporter;
pub use status::{StatusClass, Verdict};
pub use types::{CaseResult, FileOutcome, FileReport, RunSummary, WorkerStatus};
