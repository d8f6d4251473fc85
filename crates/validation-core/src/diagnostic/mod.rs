//! # Diagnostic Model
//!
//! What went wrong, separated from what to tell the client and what to do
//! next:
//!
//! - [`ErrorType`]: the closed error taxonomy
//! - [`DetailedValidationError`]: the full diagnostic for one rejected request
//! - [`ValidationResult`]: pass/fail outcome of a validator
//! - [`ErrorStatistics`]: per-type counters
//! - [`DiagnosticGenerator`]: builds diagnostics for each protocol failure class

pub mod detailed;
pub mod error_type;
pub mod generator;
pub mod statistics;
pub mod suggestions;

pub use detailed::{DetailedValidationError, ValidationResult};
pub use error_type::ErrorType;
pub use generator::DiagnosticGenerator;
pub use statistics::ErrorStatistics;
