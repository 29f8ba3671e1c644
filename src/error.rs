//! Error handling.

use axum::{
    extract::rejection::JsonRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ndarray::ShapeError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tracing::{event, Level};

/// Gateway error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The identity provider rejected the supplied credentials
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Error contacting the identity provider
    #[error("error contacting identity provider")]
    UpstreamRequest(#[from] reqwest::Error),

    /// Unexpected response from the identity provider
    #[error("unexpected response from identity provider (HTTP {status})")]
    UpstreamUnavailable { status: u16 },

    /// No bearer token was presented with the request
    #[error("no bearer token provided with request")]
    TokenMissing,

    /// The presented token has passed its expiry time
    #[error("token has expired")]
    TokenExpired,

    /// The presented token is malformed or its signature does not verify
    #[error("invalid token")]
    TokenInvalid(#[source] jsonwebtoken::errors::Error),

    /// The presented token has been revoked before its natural expiry
    #[error("token has been revoked")]
    TokenRevoked,

    /// The requested alias is not registered
    #[error("unknown dataset alias {alias}")]
    UnknownAlias { alias: String },

    /// The requested path is outside the configured data root
    ///
    /// The message is fixed and carries no filesystem detail, whether or not the target exists.
    #[error("dataset path is not allowed")]
    PathNotAllowed,

    /// The requested field is not present in the dataset schema
    #[error("field {field} not found in dataset")]
    FieldNotFound { field: String },

    /// A requested column name is not in the field's column index
    #[error("column {column} not found in field")]
    ColumnNotFound { column: String },

    /// The dataset header could not be parsed
    #[error("failed to parse dataset: {detail}")]
    CorruptDataset { detail: String },

    /// Error reading dataset contents
    #[error("failed to read dataset")]
    DatasetIo(#[from] std::io::Error),

    /// Declared mask size does not match the decoded element count
    #[error("mask size {declared} does not match decoded element count {actual}")]
    MaskSizeMismatch { declared: usize, actual: usize },

    /// Boolean mask length does not match the field's first dimension
    #[error("boolean mask length {mask} does not match field length {field}")]
    MaskLengthMismatch { mask: usize, field: usize },

    /// An index mask entry lies outside the field's first dimension
    #[error("mask index {index} is out of range for field of length {length}")]
    MaskIndexOutOfRange { index: i64, length: usize },

    /// The serialised mask contents could not be decoded
    #[error("mask data is not valid: {detail}")]
    MaskInvalid { detail: String },

    /// The array contains values the text encoding cannot round-trip
    #[error("array contains non-finite values that cannot be encoded")]
    NonFiniteData,

    /// Error deserialising request data
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating request data (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating request data (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// Error creating ndarray ArrayView from Shape
    #[error("failed to create array from shape")]
    ShapeInvalid(#[from] ShapeError),
}

impl IntoResponse for GatewayError {
    /// Convert from a `GatewayError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 401 unauthorised ErrorResponse
    fn unauthorised<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::UNAUTHORIZED, error)
    }

    /// Return a 403 forbidden ErrorResponse
    fn forbidden<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::FORBIDDEN, error)
    }

    /// Return a 404 not found ErrorResponse
    fn not_found<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Return a 502 bad gateway ErrorResponse
    fn bad_gateway<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_GATEWAY, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<GatewayError> for ErrorResponse {
    /// Convert from a `GatewayError` into an `ErrorResponse`.
    fn from(error: GatewayError) -> Self {
        let response = match &error {
            // Bad request
            GatewayError::MaskSizeMismatch {
                declared: _,
                actual: _,
            }
            | GatewayError::MaskLengthMismatch { mask: _, field: _ }
            | GatewayError::MaskIndexOutOfRange {
                index: _,
                length: _,
            }
            | GatewayError::MaskInvalid { detail: _ }
            | GatewayError::RequestDataJsonRejection(_)
            | GatewayError::RequestDataValidationSingle(_)
            | GatewayError::RequestDataValidation(_) => Self::bad_request(&error),

            // Unauthorised
            GatewayError::InvalidCredentials
            | GatewayError::TokenMissing
            | GatewayError::TokenExpired
            | GatewayError::TokenInvalid(_)
            | GatewayError::TokenRevoked => Self::unauthorised(&error),

            // Forbidden
            GatewayError::PathNotAllowed => Self::forbidden(&error),

            // Not found
            GatewayError::UnknownAlias { alias: _ }
            | GatewayError::FieldNotFound { field: _ }
            | GatewayError::ColumnNotFound { column: _ } => Self::not_found(&error),

            // Bad gateway
            GatewayError::UpstreamRequest(_)
            | GatewayError::UpstreamUnavailable { status: _ } => Self::bad_gateway(&error),

            GatewayError::DatasetIo(io_error) => {
                // Tailor the response based on the specific IO error kind.
                match io_error.kind() {
                    std::io::ErrorKind::NotFound => Self::not_found(&error),
                    _ => Self::internal_server_error(&error),
                }
            }

            // Internal server error
            GatewayError::CorruptDataset { detail: _ }
            | GatewayError::NonFiniteData
            | GatewayError::ShapeInvalid(_) => Self::internal_server_error(&error),
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hyper::HeaderMap;

    // Jump through the hoops to get the body as a string.
    async fn body_string(response: Response) -> String {
        String::from_utf8(
            hyper::body::to_bytes(response.into_body())
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap()
    }

    async fn test_gateway_error(
        error: GatewayError,
        status: StatusCode,
        message: &str,
        caused_by: Option<Vec<&'static str>>,
    ) {
        let response = error.into_response();
        assert_eq!(status, response.status());
        let mut headers = HeaderMap::new();
        headers.insert(&header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert_eq!(headers, *response.headers());
        let error_response: ErrorResponse =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(message.to_string(), error_response.error.message);
        // Map Vec items from str to String
        let caused_by = caused_by.map(|cb| cb.iter().map(|s| s.to_string()).collect());
        assert_eq!(caused_by, error_response.error.caused_by);
    }

    #[tokio::test]
    async fn invalid_credentials() {
        let error = GatewayError::InvalidCredentials;
        let message = "invalid username or password";
        test_gateway_error(error, StatusCode::UNAUTHORIZED, message, None).await;
    }

    #[tokio::test]
    async fn upstream_unavailable() {
        let error = GatewayError::UpstreamUnavailable { status: 503 };
        let message = "unexpected response from identity provider (HTTP 503)";
        test_gateway_error(error, StatusCode::BAD_GATEWAY, message, None).await;
    }

    #[tokio::test]
    async fn token_missing() {
        let error = GatewayError::TokenMissing;
        let message = "no bearer token provided with request";
        test_gateway_error(error, StatusCode::UNAUTHORIZED, message, None).await;
    }

    #[tokio::test]
    async fn token_expired() {
        let error = GatewayError::TokenExpired;
        let message = "token has expired";
        test_gateway_error(error, StatusCode::UNAUTHORIZED, message, None).await;
    }

    #[tokio::test]
    async fn token_invalid() {
        let jwt_error =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken);
        let error = GatewayError::TokenInvalid(jwt_error);
        let message = "invalid token";
        let caused_by = Some(vec!["InvalidToken"]);
        test_gateway_error(error, StatusCode::UNAUTHORIZED, message, caused_by).await;
    }

    #[tokio::test]
    async fn token_revoked() {
        let error = GatewayError::TokenRevoked;
        let message = "token has been revoked";
        test_gateway_error(error, StatusCode::UNAUTHORIZED, message, None).await;
    }

    #[tokio::test]
    async fn unknown_alias() {
        let error = GatewayError::UnknownAlias {
            alias: "foo".to_string(),
        };
        let message = "unknown dataset alias foo";
        test_gateway_error(error, StatusCode::NOT_FOUND, message, None).await;
    }

    #[tokio::test]
    async fn path_not_allowed() {
        let error = GatewayError::PathNotAllowed;
        let message = "dataset path is not allowed";
        test_gateway_error(error, StatusCode::FORBIDDEN, message, None).await;
    }

    #[tokio::test]
    async fn field_not_found() {
        let error = GatewayError::FieldNotFound {
            field: "density".to_string(),
        };
        let message = "field density not found in dataset";
        test_gateway_error(error, StatusCode::NOT_FOUND, message, None).await;
    }

    #[tokio::test]
    async fn column_not_found() {
        let error = GatewayError::ColumnNotFound {
            column: "w".to_string(),
        };
        let message = "column w not found in field";
        test_gateway_error(error, StatusCode::NOT_FOUND, message, None).await;
    }

    #[tokio::test]
    async fn corrupt_dataset() {
        let error = GatewayError::CorruptDataset {
            detail: "bad magic".to_string(),
        };
        let message = "failed to parse dataset: bad magic";
        test_gateway_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, None).await;
    }

    #[tokio::test]
    async fn dataset_io_not_found() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = GatewayError::DatasetIo(io_error);
        let message = "failed to read dataset";
        let caused_by = Some(vec!["no such file"]);
        test_gateway_error(error, StatusCode::NOT_FOUND, message, caused_by).await;
    }

    #[tokio::test]
    async fn dataset_io_other() {
        let io_error = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let error = GatewayError::DatasetIo(io_error);
        let message = "failed to read dataset";
        let caused_by = Some(vec!["eof"]);
        test_gateway_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by).await;
    }

    #[tokio::test]
    async fn mask_size_mismatch() {
        let error = GatewayError::MaskSizeMismatch {
            declared: 4,
            actual: 3,
        };
        let message = "mask size 4 does not match decoded element count 3";
        test_gateway_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn mask_length_mismatch() {
        let error = GatewayError::MaskLengthMismatch { mask: 2, field: 3 };
        let message = "boolean mask length 2 does not match field length 3";
        test_gateway_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn mask_index_out_of_range() {
        let error = GatewayError::MaskIndexOutOfRange {
            index: 5,
            length: 3,
        };
        let message = "mask index 5 is out of range for field of length 3";
        test_gateway_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn request_data_validation_single() {
        let validation_error = validator::ValidationError::new("foo");
        let error = GatewayError::RequestDataValidationSingle(validation_error);
        let message = "request data is not valid";
        let caused_by = Some(vec!["Validation error: foo [{}]"]);
        test_gateway_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn request_data_validation() {
        let mut validation_errors = validator::ValidationErrors::new();
        let validation_error = validator::ValidationError::new("foo");
        validation_errors.add("bar", validation_error);
        let error = GatewayError::RequestDataValidation(validation_errors);
        let message = "request data is not valid";
        let caused_by = Some(vec!["bar: Validation error: foo [{}]"]);
        test_gateway_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn shape_error() {
        let error = GatewayError::ShapeInvalid(ShapeError::from_kind(
            ndarray::ErrorKind::OutOfBounds,
        ));
        let message = "failed to create array from shape";
        let caused_by = Some(vec!["ShapeError/OutOfBounds: out of bounds indexing"]);
        test_gateway_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by).await;
    }
}
