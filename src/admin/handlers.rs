use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::binding::BindingState;
use crate::health::HealthState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub config_version: u64,
    pub binding: BindingState,
    pub domains: Vec<String>,
    pub tls: bool,
    pub active_connections: u64,
    pub accepted_connections: u64,
}

#[derive(Serialize)]
pub struct UpstreamStatus {
    pub name: String,
    pub address: String,
    pub health_check_path: String,
    pub health: HealthState,
}

#[derive(Serialize)]
pub struct ReloadOutcome {
    pub config_version: u64,
    pub transition: String,
}

#[derive(Serialize)]
pub struct AdminError {
    pub error: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.store.load();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        config_version: snapshot.version,
        binding: snapshot.binding.state(),
        domains: snapshot.binding.domains().to_vec(),
        tls: snapshot.binding.tls().is_some(),
        active_connections: state.connections.active_count(),
        accepted_connections: state.connections.accepted_count(),
    })
}

pub async fn get_upstreams(State(state): State<AdminState>) -> Json<Vec<UpstreamStatus>> {
    let snapshot = state.store.load();
    let statuses = snapshot
        .upstreams
        .all()
        .into_iter()
        .map(|u| UpstreamStatus {
            name: u.name.clone(),
            address: u.authority.to_string(),
            health_check_path: u.health_check_path.clone(),
            health: u.health.state(),
        })
        .collect();
    Json(statuses)
}

pub async fn post_reload(
    State(state): State<AdminState>,
) -> Result<Json<ReloadOutcome>, (StatusCode, Json<AdminError>)> {
    let Some(path) = state.config_path.as_deref() else {
        return Err((
            StatusCode::CONFLICT,
            Json(AdminError {
                error: "router was started without a configuration file".into(),
            }),
        ));
    };

    match state.reloader.reload_from(path).await {
        Ok(live) => Ok(Json(ReloadOutcome {
            config_version: live.version,
            transition: live.transition.to_string(),
        })),
        Err(e) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(AdminError { error: e.to_string() }),
        )),
    }
}
