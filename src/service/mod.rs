//! ResourceService: one generic service per exposed table.

mod resource;
pub use resource::{CreateOutcome, ResourceService};
