//! Application entry point for the `indoorflow` service.
//!
//! Startup sequence:
//! - Initialize structured logging/tracing
//! - Load configuration from environment variables or `.env`
//! - Connect the configured location cache (in-memory or Redis)
//! - Optionally connect the PostgreSQL observation log
//! - Build the floor-plan registry and area index into [`AppState`]
//! - Mount all routes via the `routes` gateway and serve
//!
//! # Environment Variables
//! See [`indoorflow::config::load_from_env`] for the service settings, plus:
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `CACHE_LOG_LEVEL` (optional) – cache module verbosity (default: as above)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//! - `FORCE_COLOR` (optional) – force ANSI colors on or off
use std::{env, io::IsTerminal, net::SocketAddr};

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use indoorflow::{analytics::AnalyticsSink, cache, config, routes, AppState};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let cache = cache::connect(&cfg.cache)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect location cache: {}", e))?;

    let sink = match &cfg.analytics_db_url {
        Some(url) => Some(AnalyticsSink::connect(url, cfg.db_pool_max).await?),
        None => None,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let state = AppState::new(cfg, cache, sink);

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Color output follows TTY detection unless `FORCE_COLOR` is
///   `1|true|yes` (on) or `0|false|no` (off)
/// - `AXUM_SPAN_EVENTS`: `"full"` emits ENTER, EXIT and CLOSE, `"enter_exit"`
///   ENTER and EXIT only, anything else CLOSE only
/// - `RUST_LOG` wins over `AXUM_LOG_LEVEL` and `CACHE_LOG_LEVEL`; see
///   [`default_filter`] for what those two control
///
/// Call once, before any logging macro is used.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = log_level(env::var("AXUM_LOG_LEVEL").ok().as_deref()).unwrap_or("debug");
        let cache_level = log_level(env::var("CACHE_LOG_LEVEL").ok().as_deref());
        EnvFilter::new(default_filter(level, cache_level))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}

fn log_level(value: Option<&str>) -> Option<&'static str> {
    match value? {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

/// Filter used when `RUST_LOG` is unset.
///
/// `level` applies to this service and to per-request spans from
/// `tower_http`. The cache module, which logs every subscription open and
/// close, can be tuned apart with `cache_level`. Dependencies stay at `warn`,
/// except Redis and sqlx connection setup at `info`.
fn default_filter(level: &str, cache_level: Option<&str>) -> String {
    // ---
    let cache_level = cache_level.unwrap_or(level);
    format!(
        "warn,indoorflow={level},indoorflow::cache={cache_level},tower_http={level},\
         redis=info,sqlx=info,sqlx::query=warn"
    )
}
