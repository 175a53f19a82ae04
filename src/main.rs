//! ==============================================================================
//! main.rs - roomwatch entry point
//! ==============================================================================
//!
//! purpose:
//!     host-side daemon for a single-room environment dashboard. subscribes
//!     to the hosted realtime database's push feed, keeps a cached snapshot
//!     plus a rolling window of chart samples, classifies the dust reading,
//!     serves the dashboard state over http, and issues fire-and-forget
//!     toggle writes for the three actuator booleans.
//!
//! responsibilities:
//!     - load configuration and initialize logging
//!     - own the shared session state (Arc<RwLock<DashboardSession>>)
//!     - serve the dashboard shell and json state api
//!     - arm the one-time startup loading timeout
//!     - hold the feed subscription handle and release it on shutdown
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                   roomwatch (this file)                  │
//!     │  ┌──────────────┐  ┌──────────────┐  ┌───────────────┐  │
//!     │  │ feed task     │  │ web server   │  │ loading timer │  │
//!     │  │ (subscription)│  │ (axum)       │  │ (one-shot)    │  │
//!     │  └──────┬───────┘  └──────┬───────┘  └──────┬────────┘  │
//!     │         │ writes          │ reads           │ writes     │
//!     │         └────────────► session ◄────────────┘            │
//!     └──────────────────────────────────────────────────────────┘
//!
//!     feed task is the only writer of telemetry; http handlers only read.
//!     control toggles write back to the feed, never to the session.
//!
//! ==============================================================================

mod config;
mod controls;
mod ingest;
mod session;
mod severity;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use controls::{ControlField, ControlPanel};
use ingest::FeedClient;
use session::{DashboardSession, SharedSession};
use severity::SeverityLevel;
use telemetry::{ChartPoint, Snapshot};

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::MonitorConfig::load_or_default();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();
    config.log_summary();

    let session: SharedSession = Arc::new(RwLock::new(DashboardSession::new(
        config.window.capacity,
    )));
    let client = FeedClient::new(&config.feed.base_url, &config.feed.room);
    let controls = Arc::new(ControlPanel::new(client.clone(), session.clone()));

    // web server in background
    let web_session = session.clone();
    let web_controls = controls.clone();
    let bind = config.server.bind.clone();
    tokio::spawn(async move {
        info!("[STARTUP] Dashboard live at http://{bind}");
        if let Err(e) = run_server(&bind, web_session, web_controls).await {
            error!("[SERVER] {e:#}");
        }
    });

    // one-time startup timeout: exit the loading state even if no data has
    // arrived, independent of the subscription's own delivery
    let timeout_session = session.clone();
    let loading_timeout = Duration::from_millis(config.startup.loading_timeout_ms);
    tokio::spawn(async move {
        tokio::time::sleep(loading_timeout).await;
        timeout_session.write().await.finish_loading();
    });

    // the subscription drives all telemetry updates for the rest of the
    // process lifetime; the handle is released explicitly on shutdown
    let subscription = ingest::subscribe(
        client,
        session,
        Duration::from_millis(config.feed.reconnect_backoff_ms),
    );

    tokio::signal::ctrl_c().await?;
    info!("[SHUTDOWN] releasing feed subscription");
    subscription.cancel();
    Ok(())
}

// ==============================================================================
// web server
// ==============================================================================

#[derive(Clone)]
struct ServerState {
    session: SharedSession,
    controls: Arc<ControlPanel>,
}

async fn run_server(
    bind: &str,
    session: SharedSession,
    controls: Arc<ControlPanel>,
) -> Result<()> {
    let app = Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/state", get(api_handler))
        .route("/api/controls", post(controls_handler))
        .layer(CorsLayer::permissive())
        .with_state(ServerState { session, controls });

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// full dashboard state as consumed by the shell (or any other front end)
#[derive(Serialize)]
struct StatePayload {
    snapshot: Snapshot,
    window: Vec<ChartPoint>,
    severity: SeverityPayload,
    loading: bool,
    stale: bool,
    last_update_ms: i64,
}

#[derive(Serialize)]
struct SeverityPayload {
    level: SeverityLevel,
    label: &'static str,
    color: &'static str,
}

/// json api endpoint: current snapshot, rolling window, and the locally
/// computed severity. led_status rides along inside the snapshot and may
/// disagree with the severity - both are reported, neither is reconciled.
async fn api_handler(State(state): State<ServerState>) -> Json<StatePayload> {
    let session = state.session.read().await;
    let level = session.severity();
    Json(StatePayload {
        snapshot: session.snapshot().clone(),
        window: session.window().points().to_vec(),
        severity: SeverityPayload {
            level,
            label: level.label(),
            color: level.color_tag(),
        },
        loading: session.loading(),
        stale: session.stale(),
        last_update_ms: session.last_update_ms(),
    })
}

/// toggle request params
#[derive(Deserialize)]
struct ToggleParams {
    field: String,
}

/// control endpoint
/// POST /api/controls?field=manual_led|manual_buzzer|use_simulation
async fn controls_handler(
    State(state): State<ServerState>,
    Query(params): Query<ToggleParams>,
) -> Json<serde_json::Value> {
    match ControlField::parse(&params.field) {
        Some(field) => {
            let value = state.controls.toggle(field).await;
            Json(serde_json::json!({
                "status": "ok",
                "field": field.field_name(),
                "value": value,
            }))
        }
        None => Json(serde_json::json!({
            "status": "error",
            "message": "unknown field",
        })),
    }
}

/// minimal dashboard shell: polls /api/state and renders the cards, the
/// alarm badge, and the window as a plain table. charting stays out of
/// scope here - any front end can consume /api/state instead.
async fn dashboard_handler() -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}

const DASHBOARD_PAGE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>roomwatch</title>
<style>
  body { font-family: system-ui; margin: 2rem; background: #f8fafc; color: #1e293b; }
  .cards { display: flex; gap: 1rem; flex-wrap: wrap; }
  .card { background: #fff; border: 1px solid #e2e8f0; border-radius: 12px; padding: 1rem 1.5rem; min-width: 10rem; }
  .card .value { font-size: 2rem; font-weight: 700; }
  .badge { display: inline-block; padding: 0.3rem 0.8rem; border-radius: 999px; font-weight: 600; }
  .badge.alarm { background: #fef2f2; color: #dc2626; }
  .badge.ok { background: #ecfdf5; color: #059669; }
  .emerald { color: #10b981; } .yellow { color: #eab308; }
  .orange { color: #f97316; } .red { color: #ef4444; }
  table { border-collapse: collapse; margin-top: 1rem; background: #fff; }
  th, td { border: 1px solid #e2e8f0; padding: 0.3rem 0.8rem; text-align: right; }
  button { margin-right: 0.5rem; padding: 0.4rem 1rem; border-radius: 8px; border: 1px solid #cbd5e1; background: #fff; cursor: pointer; }
  .muted { color: #94a3b8; }
</style>
</head>
<body>
<h1>Room Environment</h1>
<p id="status" class="muted">loading…</p>
<div class="cards">
  <div class="card"><div class="muted">Temperature (&deg;C)</div><div class="value" id="temperature">-</div></div>
  <div class="card"><div class="muted">Humidity (%)</div><div class="value" id="humidity">-</div></div>
  <div class="card"><div class="muted">Dust (&micro;g/m&sup3;)</div><div class="value" id="dust">-</div></div>
  <div class="card"><div class="muted">Air quality</div><div class="value" id="severity">-</div></div>
</div>
<p>
  <button onclick="toggle('manual_led')">Toggle LED</button>
  <button onclick="toggle('manual_buzzer')">Toggle buzzer</button>
  <button onclick="toggle('use_simulation')">Toggle simulation</button>
</p>
<table id="window"><thead><tr><th>time</th><th>temp</th><th>hum</th><th>dust</th></tr></thead><tbody></tbody></table>
<script>
async function refresh() {
  const r = await fetch('/api/state');
  const s = await r.json();
  document.getElementById('temperature').textContent = s.snapshot.temperature.toFixed(1);
  document.getElementById('humidity').textContent = s.snapshot.humidity.toFixed(1);
  const dust = document.getElementById('dust');
  dust.textContent = Math.round(s.snapshot.dust);
  dust.className = 'value ' + s.severity.color;
  const sev = document.getElementById('severity');
  sev.textContent = s.severity.label;
  sev.className = 'value ' + s.severity.color;
  const status = document.getElementById('status');
  if (s.loading) { status.textContent = 'loading…'; status.className = 'muted'; }
  else if (s.stale) { status.textContent = 'stale data (feed disconnected)'; status.className = 'badge alarm'; }
  else if (s.snapshot.led_status) { status.textContent = 'ALARM (device)'; status.className = 'badge alarm'; }
  else { status.textContent = 'normal'; status.className = 'badge ok'; }
  const body = document.querySelector('#window tbody');
  body.innerHTML = s.window.map(p =>
    `<tr><td>${p.time}</td><td>${p.temperature.toFixed(1)}</td><td>${p.humidity.toFixed(1)}</td><td>${p.dust}</td></tr>`
  ).join('');
}
async function toggle(field) {
  await fetch('/api/controls?field=' + field, { method: 'POST' });
}
refresh();
setInterval(refresh, 2000);
</script>
</body>
</html>
"#;
