use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use videoforge::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "videoforge-server", about = "HTTP surface for the video job orchestrator")]
struct Args {
    #[arg(long, default_value = "configs")]
    configs_dir: String,
    #[arg(long, default_value = "data/artifacts")]
    artifacts_dir: String,
    #[arg(long, default_value = "data/events")]
    events_dir: String,
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,
}

type AppState = Arc<ServiceContext>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

    let args = Args::parse();
    let context = ServiceContext::start(args.configs_dir, args.artifacts_dir, args.events_dir)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let app = Router::new()
        .route("/jobs", post(submit_job))
        .route("/jobs/{job_id}", get(get_job))
        .route("/jobs/{job_id}/artifact/{name}", get(get_artifact))
        .route("/admin/reload-config", post(reload_config))
        .route("/health", get(health))
        .route("/health/providers", get(health_providers))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(context);

    let addr: SocketAddr = args.listen.parse()?;
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn submit_job(State(context): State<AppState>, Json(job): Json<JobRequest>) -> impl IntoResponse {
    let job_id = context.submit_job(job).await;
    (StatusCode::ACCEPTED, Json(json!({ "job_id": job_id })))
}

async fn get_job(State(context): State<AppState>, Path(job_id): Path<String>) -> Response {
    match context.get_job(&job_id) {
        Some(record) => Json(record).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "job not found" }))).into_response(),
    }
}

async fn get_artifact(State(context): State<AppState>, Path((job_id, name)): Path<(String, String)>) -> Response {
    let Some(record) = context.get_job(&job_id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "job not found" }))).into_response();
    };
    let Some(path) = record.artifacts.get(&name) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "artifact not found" }))).into_response();
    };
    match tokio::fs::read(path).await {
        Ok(bytes) => bytes.into_response(),
        Err(err) => {
            tracing::error!(job_id, name, %err, "failed to read artifact");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "failed to read artifact" }))).into_response()
        }
    }
}

async fn reload_config(State(context): State<AppState>) -> Response {
    match context.reload_config().await {
        Ok(()) => Json(json!({ "status": "reloaded" })).into_response(),
        Err(err) => {
            tracing::error!(%err, "config reload failed");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn health_providers(State(context): State<AppState>) -> impl IntoResponse {
    Json(context.provider_statuses())
}
