//! Tamgu · Science-Inquiry Worksheet Backend
//!
//! - Axum HTTP + WebSocket API for the 9-step worksheet and the teacher
//!   dashboard
//! - Local JSON-file persistence; optional spreadsheet-backed endpoint
//! - Optional OpenAI integration (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT            : u16 (default 3000)
//!   DATA_PATH          : persistence file (default ./data/worksheet.json)
//!   SHEET_ENDPOINT_URL    : enables the remote submission endpoint if present
//!   OPENAI_API_KEY     : enables the AI advisor if present
//!   OPENAI_BASE_URL    : default "https://api.openai.com/v1"
//!   OPENAI_MODEL     : default "gpt-4o-mini"
//!   WORKSHEET_CONFIG_PATH  : path to TOML config (prompts + optional step catalog)
//!   LOG_LEVEL    : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod steps;
mod ingest;
mod persist;
mod store;
mod evaluate;
mod protocol;
mod openai;
mod sheet;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::store::ReportStore;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (submission store, catalog, clients).
  let store = Arc::new(ReportStore::new());

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(store.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "tamgu_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
