//! Router pieces: per-table resource routes and the /_service routes.

mod common;
mod resource;

pub use common::service_routes;
pub use resource::resource_routes;
