use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use anyhow::Context;
use lap_analytics::{
    combine_insights, estimate_target_lap, score_anomalies, AnalyticsError, AnomalyReport,
    ScoringConfig, SiwtlResult,
};
use serde_json::json;
use std::{path::PathBuf, sync::Arc};

mod types;

use types::{
    ComprehensiveOut, ComprehensiveRequest, DptadRequest, FleetEntry, FleetOut, FleetRequest,
    SiwtlRequest,
};

type ApiError = (StatusCode, Json<serde_json::Value>);

// ---------- Server state ----------

#[derive(Clone)]
struct AppState {
    cfg: Arc<ScoringConfig>,
}

// ---------- Error mapping ----------

fn reject(e: AnalyticsError) -> ApiError {
    tracing::warn!("request rejected: {}", e);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": e.to_string(), "kind": e.kind() })),
    )
}

// ---------- Handlers ----------

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn dptad(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    Json(payload): Json<DptadRequest>,
) -> Result<Json<AnomalyReport>, ApiError> {
    score_anomalies(&vehicle_id, &payload.rows, &state.cfg)
        .map(Json)
        .map_err(reject)
}

async fn siwtl(
    Path(vehicle_id): Path<String>,
    Json(payload): Json<SiwtlRequest>,
) -> Result<Json<SiwtlResult>, ApiError> {
    estimate_target_lap(&vehicle_id, &payload.laps)
        .map(Json)
        .map_err(reject)
}

async fn comprehensive(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    Json(payload): Json<ComprehensiveRequest>,
) -> Result<Json<ComprehensiveOut>, ApiError> {
    let dptad = if payload.rows.is_empty() {
        None
    } else {
        Some(score_anomalies(&vehicle_id, &payload.rows, &state.cfg).map_err(reject)?)
    };

    // Unusable laps still leave the anomaly half worth returning.
    let siwtl = match estimate_target_lap(&vehicle_id, &payload.laps) {
        Ok(r) => Some(r),
        Err(e @ (AnalyticsError::NoValidLaps { .. } | AnalyticsError::InsufficientData { .. })) => {
            tracing::info!("vehicle={} no target lap: {}", vehicle_id, e);
            None
        }
        Err(e) => return Err(reject(e)),
    };

    let mut algorithms_used = Vec::new();
    if dptad.is_some() {
        algorithms_used.push("DPTAD");
    }
    if siwtl.is_some() {
        algorithms_used.push("SIWTL");
    }

    Ok(Json(ComprehensiveOut {
        combined_insights: combine_insights(dptad.as_ref(), siwtl.as_ref()),
        vehicle_id,
        dptad,
        siwtl,
        algorithms_used,
    }))
}

async fn fleet_siwtl(Json(payload): Json<FleetRequest>) -> Result<Json<FleetOut>, ApiError> {
    let jobs = payload.vehicles.into_iter().map(|(vehicle_id, laps)| {
        tokio::task::spawn_blocking(move || {
            let entry = match estimate_target_lap(&vehicle_id, &laps) {
                Ok(r) => FleetEntry::Ok(r),
                Err(e) => FleetEntry::Failed {
                    error: e.to_string(),
                    kind: e.kind(),
                },
            };
            (vehicle_id, entry)
        })
    });

    let mut vehicles = std::collections::BTreeMap::new();
    for joined in futures::future::join_all(jobs).await {
        let (vehicle_id, entry) = joined.map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?;
        vehicles.insert(vehicle_id, entry);
    }
    tracing::info!("fleet siwtl scored {} vehicles", vehicles.len());

    Ok(Json(FleetOut { vehicles }))
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/dptad/:vehicle_id", post(dptad))
        .route("/siwtl/:vehicle_id", post(siwtl))
        .route("/comprehensive/:vehicle_id", post(comprehensive))
        .route("/fleet/siwtl", post(fleet_siwtl))
        .with_state(state)
}

fn resolve_config_path() -> Option<PathBuf> {
    // run from the package dir, the workspace root, or next to the binary
    let candidates = [
        PathBuf::from("config/scoring.json"),
        PathBuf::from("coaching_backend/config/scoring.json"),
        {
            let mut p = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
            p.pop(); // exe dir
            p.push("config/scoring.json");
            p
        },
    ];
    candidates.into_iter().find(|c| c.exists())
}

fn load_config() -> anyhow::Result<ScoringConfig> {
    let path = match std::env::var("SCORING_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => match resolve_config_path() {
            Some(path) => path,
            None => {
                tracing::info!("no scoring config found; using default scoring constants");
                return Ok(ScoringConfig::default());
            }
        },
    };
    let cfg = ScoringConfig::load(&path)
        .with_context(|| format!("failed to load scoring config {}", path.display()))?;
    tracing::info!("loaded scoring config from {}", path.display());
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080);
    let cfg = load_config()?;
    tracing::info!("scoring config: {:?}", cfg);

    let state = AppState { cfg: Arc::new(cfg) };

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
