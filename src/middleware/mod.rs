//! Response middleware for read routes.

mod cache;
mod conditional;

pub use cache::cache_control;
pub use conditional::{conditional_get, entity_tag};
