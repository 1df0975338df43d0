use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    error::BubblemapError,
    models::{
        bubblemap::{BubblemapRequest, ChainInfo, ChainsResponse, ErrorResponse},
        trade::Chain,
    },
    services::pipeline::{build_bubblemap, PipelineOutcome},
    AppState,
};

/// Handler for POST /api/bubblemap
pub async fn create_bubblemap(
    State(state): State<AppState>,
    payload: Result<Json<BubblemapRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PipelineOutcome>), (StatusCode, Json<ErrorResponse>)> {
    let Json(request) = payload.map_err(rejection_response)?;

    tracing::info!(
        "Bubblemap requested for {} on {} ({} to {})",
        request.token_address,
        request.chain,
        request.start_date,
        request.end_date
    );

    let config = request
        .into_config(Utc::now().date_naive())
        .map_err(error_response)?;

    let outcome = build_bubblemap(state.trade_source.as_ref(), &config)
        .await
        .map_err(error_response)?;

    if outcome.is_empty() {
        tracing::warn!(
            "No traders matched for {} on {}",
            config.token_address,
            config.chain.as_str()
        );
    }

    Ok((StatusCode::OK, Json(outcome)))
}

/// Handler for GET /api/chains
pub async fn list_chains() -> Json<ChainsResponse> {
    let chains = Chain::all()
        .into_iter()
        .map(|chain| ChainInfo {
            chain,
            family: chain.family(),
        })
        .collect();

    Json(ChainsResponse { chains })
}

const REQUEST_FIELDS: [&str; 12] = [
    "token_address",
    "chain",
    "start_date",
    "end_date",
    "min_volume",
    "max_volume",
    "min_trades",
    "min_active_days",
    "max_traders",
    "min_connection_strength",
    "weight_basis",
    "rank_by",
];

/// Body errors share the `{error, field}` shape of validation errors
fn rejection_response(rejection: JsonRejection) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &rejection {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => StatusCode::BAD_REQUEST,
        other => other.status(),
    };
    let error = rejection.body_text();
    let field = rejected_field(&error).map(str::to_string);

    tracing::debug!("Rejected bubblemap body: {}", error);
    (status, Json(ErrorResponse { error, field }))
}

/// Field named by a serde message, either as a path prefix (`min_trades: invalid type`)
/// or quoted (missing field `chain`)
fn rejected_field(message: &str) -> Option<&'static str> {
    REQUEST_FIELDS.into_iter().find(|name| {
        message.contains(&format!(" {}: ", name)) || message.contains(&format!("`{}`", name))
    })
}

fn error_response(err: BubblemapError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        BubblemapError::InvalidConfiguration { field, reason } => {
            tracing::debug!("Rejected bubblemap request: {} ({})", reason, field);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: reason,
                    field: Some(field.to_string()),
                }),
            )
        }
        BubblemapError::Upstream(e) => {
            tracing::error!("Warehouse query failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: format!("Failed to fetch trades: {}", e),
                    field: None,
                }),
            )
        }
    }
}
