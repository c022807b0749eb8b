//! `indoorflow`: access-point sighting ingest, floor-plan georeferencing and
//! live indoor location feeds.
//!
//! Module gateway. The binary only wires these together:
//! - `config` reads the environment into an immutable [`Config`]
//! - `floorplan` and `area` hold the startup-built lookup structures
//! - `cache` is the key-value store with change notification
//! - `routes` exposes everything over HTTP and WebSocket

pub mod analytics;
pub mod area;
pub mod cache;
pub mod config;
pub mod error;
pub mod floorplan;
pub mod geometry;
pub mod ingest;
pub mod live;
pub mod models;
pub mod routes;
pub mod schema;
pub mod state;

pub use config::Config;
pub use state::AppState;
