pub mod loader;
pub mod selector;
pub mod types;

pub use loader::{collect_case_files, discover_case_files, is_case_file, load_cases};
pub use selector::{SelectionStrategy, select_case_files};
pub use types::{Case, CaseId, StepKind};
