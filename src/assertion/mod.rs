pub mod evaluator;
pub mod json;
pub mod parser;
pub mod types;

pub use evaluator::{AssertContext, evaluate, evaluate_all, evaluate_directive};
pub use parser::{matched_prefix, parse_directive};
pub use types::{AssertError, AssertionReport, AssertionResult, Directive, JsonPathOp};
