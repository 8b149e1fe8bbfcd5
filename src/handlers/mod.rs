//! HTTP handlers for exposed tables.

pub mod resource;
