//! Change-to-route scheduling and render orchestration.
//!
//! The pipeline is a straight line: detect changed content, map it to
//! affected routes, render those routes, store the artifacts. This crate
//! owns the middle two hops and the loop that drives the whole cycle.

pub mod pipeline;
pub mod poller;
pub mod routes;
pub mod scheduler;

pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineReport};
pub use poller::Poller;
pub use routes::RouteRules;
pub use scheduler::{PlannedRoute, RenderScheduler, RoutePlan};
