pub mod assertion;
pub mod case;
pub mod error;
pub mod http;
pub mod keyword;
pub mod logger;
pub mod runner;
pub mod utils;
pub mod variable;

// Re-export commonly used types
pub use error::{Result, RucaseError};
