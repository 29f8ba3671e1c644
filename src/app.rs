//! HTTP API surface.
//!
//! Token issuance is open; everything under `/v1` requires a bearer token. Token validation
//! runs in the [Identity] extractor, so it short-circuits before a request body is parsed or
//! any dataset is touched.

use crate::app_state::SharedAppState;
use crate::auth::{self, Identity};
use crate::error::GatewayError;
use crate::loader::{self, FieldSpec};
use crate::metadata;
use crate::metrics;
use crate::models::{
    ArrayPayload, DataRequest, MetadataRequest, MetadataResponse, TokenRequest, TokenResponse,
};
use crate::payload;
use crate::resolver::{DataReference, ResolvedHandle};
use crate::validated_json::ValidatedJson;

use axum::{
    body::Body,
    extract::State,
    http::header,
    http::HeaderMap,
    http::Request,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;

/// Returns the application router.
pub fn router(state: SharedAppState) -> Router {
    fn v1() -> Router<SharedAppState> {
        Router::new()
            .route("/masked_dataset", post(masked_dataset))
            .route("/unmasked_dataset", post(unmasked_dataset))
            .route("/metadata", post(dataset_metadata))
            .route("/revoke", post(revoke))
            .layer(ValidateRequestHeaderLayer::custom(
                // Cheap presence check; the Identity extractor performs full validation.
                |request: &mut Request<Body>| {
                    if request.headers().contains_key(header::AUTHORIZATION) {
                        Ok(())
                    } else {
                        Err(GatewayError::TokenMissing.into_response())
                    }
                },
            ))
    }

    Router::new()
        .route("/ping", get(ping))
        .route("/token", post(issue_token))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/v1", v1())
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .on_request(metrics::request_counter)
                    .on_response(metrics::record_response_metrics),
            ),
        )
        .with_state(state)
}

/// Liveness probe.
async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ping": "pong"}))
}

/// Exchange a credential pair for a bearer token.
async fn issue_token(
    State(state): State<SharedAppState>,
    ValidatedJson(request_data): ValidatedJson<TokenRequest>,
) -> Result<Json<TokenResponse>, GatewayError> {
    let (token, expires_in) = state
        .token_service
        .issue(&request_data.username, &request_data.password)
        .await?;
    Ok(Json(TokenResponse { token, expires_in }))
}

/// Build a dataset reference from request fields.
///
/// Validation guarantees at least one is present; an explicit filename takes precedence.
fn data_reference(
    alias: &Option<String>,
    filename: &Option<String>,
) -> Result<DataReference, GatewayError> {
    if let Some(filename) = filename {
        Ok(DataReference::Path(filename.clone()))
    } else if let Some(alias) = alias {
        Ok(DataReference::Alias(alias.clone()))
    } else {
        Err(GatewayError::RequestDataValidationSingle(
            validator::ValidationError::new("Either alias or filename must be provided"),
        ))
    }
}

/// Load a field under a blocking task and serialise the result.
async fn load_and_serialize(
    handle: ResolvedHandle,
    spec: FieldSpec,
) -> Result<ArrayPayload, GatewayError> {
    let result = tokio::task::spawn_blocking(move || loader::load(&handle, &spec))
        .await
        .map_err(|err| {
            GatewayError::DatasetIo(std::io::Error::new(std::io::ErrorKind::Other, err))
        })??;
    payload::serialize(&result)
}

/// Retrieve a masked array from a dataset.
async fn masked_dataset(
    State(state): State<SharedAppState>,
    _identity: Identity,
    ValidatedJson(request_data): ValidatedJson<DataRequest>,
) -> Result<Json<ArrayPayload>, GatewayError> {
    if request_data.mask_array_json.is_none() {
        return Err(GatewayError::RequestDataValidationSingle(
            validator::ValidationError::new(
                "No mask information found. Use the unmasked endpoint if requesting unmasked data",
            ),
        ));
    }
    let reference = data_reference(&request_data.alias, &request_data.filename)?;
    let handle = state.resolver.resolve(&reference)?;
    let spec = FieldSpec::from_request(&request_data);
    Ok(Json(load_and_serialize(handle, spec).await?))
}

/// Retrieve an unmasked array from a dataset.
///
/// Mask fields, if supplied, are ignored here.
async fn unmasked_dataset(
    State(state): State<SharedAppState>,
    _identity: Identity,
    ValidatedJson(request_data): ValidatedJson<DataRequest>,
) -> Result<Json<ArrayPayload>, GatewayError> {
    let reference = data_reference(&request_data.alias, &request_data.filename)?;
    let handle = state.resolver.resolve(&reference)?;
    let spec = FieldSpec {
        field: request_data.field.clone(),
        columns: request_data.columns.clone(),
        mask: None,
    };
    Ok(Json(load_and_serialize(handle, spec).await?))
}

/// Retrieve unit system and schema metadata for a dataset.
async fn dataset_metadata(
    State(state): State<SharedAppState>,
    _identity: Identity,
    ValidatedJson(request_data): ValidatedJson<MetadataRequest>,
) -> Result<Json<MetadataResponse>, GatewayError> {
    let reference = data_reference(&request_data.alias, &request_data.filename)?;
    let handle = state.resolver.resolve(&reference)?;
    Ok(Json(metadata::dataset_metadata(&handle)?))
}

/// Revoke the presented token before its natural expiry.
async fn revoke(
    State(state): State<SharedAppState>,
    _identity: Identity,
    headers: HeaderMap,
) -> Result<StatusCode, GatewayError> {
    let token = auth::bearer_token(&headers)?;
    state.token_service.revoke(&token)?;
    Ok(StatusCode::NO_CONTENT)
}
