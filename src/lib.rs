//! Multi-modal route planning across Taiwan over a static transit dataset.

pub mod api;
pub mod config;
pub mod dataset;
pub mod error;
pub mod geo;
pub mod location;
pub mod logger;
pub mod model;
pub mod routing;
