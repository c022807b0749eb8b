//! Shared application state handed to every route.

use std::sync::Arc;

use tracing::info;

use crate::analytics::AnalyticsSink;
use crate::area::AreaIndex;
use crate::cache::SharedCache;
use crate::config::Config;
use crate::floorplan::{FloorPlanRegistry, LocationResolver};

/// Everything built at startup. Read-only afterwards, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resolver: Arc<LocationResolver>,
    pub areas: Arc<AreaIndex>,
    pub cache: SharedCache,
    pub sink: Option<AnalyticsSink>,
}

impl AppState {
    /// Build the floor-plan registry and area index from `config` and bundle
    /// them with the already connected backends.
    pub fn new(config: Config, cache: SharedCache, sink: Option<AnalyticsSink>) -> Self {
        // ---
        let resolver = LocationResolver::new(FloorPlanRegistry::build(&config.floor_plans));
        let areas = AreaIndex::from_geojson(&config.areas);
        info!(
            floor_plans = resolver.registry().len(),
            areas = areas.len(),
            analytics = sink.is_some(),
            "Application state ready"
        );

        Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            areas: Arc::new(areas),
            cache,
            sink,
        }
    }
}
