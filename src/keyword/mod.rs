pub mod ops;
pub mod registry;

pub use ops::{KeywordContext, KeywordOutcome, run_keyword};
pub use registry::{Keyword, KeywordRegistry};
