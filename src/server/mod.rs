//! HTTP server around the scenario pipeline.
//!
//! Serves profile files and metric definitions, runs the pipeline on
//! request, and exposes saved runs for review, human annotation and export.
//! See [`routes`] for the endpoint list.

pub mod routes;

pub use routes::{app_router, AppState};
