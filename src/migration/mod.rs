//! Ordered application of SQL/PLSQL script files and post-run verification.

mod error;
mod plan;
mod runner;
mod verifier;

pub use error::*;
pub use plan::*;
pub use runner::*;
pub use verifier::*;
