//! Request handlers.
//!
//! - **Form**: rendering the input form and running submissions
//! - **Artifacts**: serving reports and cleaned CSVs
//! - **Health**: liveness probe

mod artifacts;
mod form;
mod health;

pub use artifacts::{latest_download, latest_report, run_download, run_report};
pub use form::{index, submit};
pub use health::health;
