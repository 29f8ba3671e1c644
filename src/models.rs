//! Data types and associated functions and methods

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::Display;
use validator::{Validate, ValidationError};

/// Supported element data types
///
/// Field data uses the numeric types; `bool` additionally appears as the element type of boolean
/// masks.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    /// [bool]
    Bool,
    /// [i32]
    Int32,
    /// [i64]
    Int64,
    /// [u32]
    Uint32,
    /// [u64]
    Uint64,
    /// [f32]
    Float32,
    /// [f64]
    Float64,
}

impl DType {
    /// Returns the size of the associated type in bytes.
    ///
    /// Boolean elements are stored as one byte each.
    pub fn size_of(self) -> usize {
        match self {
            Self::Bool => std::mem::size_of::<u8>(),
            Self::Int32 => std::mem::size_of::<i32>(),
            Self::Int64 => std::mem::size_of::<i64>(),
            Self::Uint32 => std::mem::size_of::<u32>(),
            Self::Uint64 => std::mem::size_of::<u64>(),
            Self::Float32 => std::mem::size_of::<f32>(),
            Self::Float64 => std::mem::size_of::<f64>(),
        }
    }
}

/// Request data for token issuance
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct TokenRequest {
    /// Username to present to the identity provider
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
    /// Secret to present to the identity provider
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

/// Response to a successful token issuance
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct TokenResponse {
    /// Signed bearer token
    pub token: String,
    /// Token lifespan in seconds
    pub expires_in: u64,
}

/// Request data for dataset field retrieval
///
/// The mask fields are optional as a group: a masked request supplies all three, an unmasked
/// request supplies none.
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_data_request"))]
pub struct DataRequest {
    /// Registered alias of the dataset
    #[validate(length(min = 1, message = "alias must not be empty"))]
    pub alias: Option<String>,
    /// Explicit dataset filename, relative to the data root
    #[validate(length(min = 1, message = "filename must not be empty"))]
    pub filename: Option<String>,
    /// Name of the field to retrieve
    #[validate(length(min = 1, message = "field must not be empty"))]
    pub field: String,
    /// Serialised mask contents as JSON text
    pub mask_array_json: Option<String>,
    /// Element type of the mask values
    pub mask_data_type: Option<DType>,
    /// Declared number of mask elements
    pub mask_size: Option<usize>,
    /// Names of sub-columns to restrict the second dimension to, in order
    #[validate(length(min = 1, message = "columns length must be greater than 0"))]
    pub columns: Option<Vec<String>>,
}

/// Request data for dataset metadata retrieval
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_metadata_request"))]
pub struct MetadataRequest {
    /// Registered alias of the dataset
    #[validate(length(min = 1, message = "alias must not be empty"))]
    pub alias: Option<String>,
    /// Explicit dataset filename, relative to the data root
    #[validate(length(min = 1, message = "filename must not be empty"))]
    pub filename: Option<String>,
}

/// Validate that a request names a dataset by alias or filename
fn validate_reference(
    alias: &Option<String>,
    filename: &Option<String>,
) -> Result<(), ValidationError> {
    if alias.is_none() && filename.is_none() {
        return Err(ValidationError::new(
            "Either alias or filename must be provided",
        ));
    }
    Ok(())
}

/// Validate request data
fn validate_data_request(request_data: &DataRequest) -> Result<(), ValidationError> {
    // Validation of multiple fields in DataRequest.
    validate_reference(&request_data.alias, &request_data.filename)?;
    let mask_fields = [
        request_data.mask_array_json.is_some(),
        request_data.mask_data_type.is_some(),
        request_data.mask_size.is_some(),
    ];
    if mask_fields.iter().any(|present| *present) && !mask_fields.iter().all(|present| *present) {
        return Err(ValidationError::new(
            "mask_array_json, mask_data_type and mask_size must be provided together",
        ));
    }
    Ok(())
}

/// Validate metadata request data
fn validate_metadata_request(request_data: &MetadataRequest) -> Result<(), ValidationError> {
    validate_reference(&request_data.alias, &request_data.filename)
}

/// A loaded (and optionally masked) field, ready for serialisation.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayResult {
    /// Raw little-endian element buffer
    pub body: Bytes,
    /// Element type of the result
    pub dtype: DType,
    /// Shape of the result
    pub shape: Vec<usize>,
    /// Unit descriptor for the field, if any
    pub units: Option<String>,
}

impl ArrayResult {
    /// Return an ArrayResult object
    pub fn new(body: Bytes, dtype: DType, shape: Vec<usize>, units: Option<String>) -> Self {
        ArrayResult {
            body,
            dtype,
            shape,
            units,
        }
    }
}

/// Transport-safe payload for an array result.
///
/// `data` uses the same JSON text encoding convention accepted for mask submission, so a client
/// may resubmit a received array as a future mask without reformatting.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct ArrayPayload {
    /// Element type name
    pub dtype: DType,
    /// Shape of the array
    pub shape: Vec<usize>,
    /// Unit descriptor, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// JSON text encoding of the element buffer
    pub data: String,
}

/// Per-field metadata returned by the metadata endpoint.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct FieldMeta {
    /// Element type of the field
    pub dtype: DType,
    /// Shape of the field
    pub shape: Vec<usize>,
    /// Unit descriptor, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Column names for the second dimension, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

/// Response to a metadata request.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct MetadataResponse {
    /// Unit system of the dataset
    pub units: BTreeMap<String, String>,
    /// Schema of the dataset, keyed by field name
    pub fields: BTreeMap<String, FieldMeta>,
}
