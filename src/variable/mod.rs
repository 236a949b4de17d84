pub mod capture;
pub mod config;
pub mod interpolate;
pub mod store;

pub use capture::{ExtractDirective, ExtractOutcome, extract, first_value_by_key};
pub use config::{ConfigLoader, Environment, RunnerSettings, SystemConfig};
pub use interpolate::{Interpolated, Interpolator, placeholder_name};
pub use store::{StoredValue, VariableStore};
