//! Dataset field loading.
//!
//! Loading opens the resolved snapshot lazily, locates the named field in the schema, restricts
//! to requested sub-columns and applies the mask, reading only the selected row ranges from
//! disk. The snapshot (and its file handle) is scoped to the call, so it is released on every
//! exit path.

use crate::array::{self, Element};
use crate::error::GatewayError;
use crate::masks::{self, MaskDescriptor};
use crate::models::{ArrayResult, DType, DataRequest};
use crate::resolver::ResolvedHandle;
use crate::snapshot::{FieldInfo, Snapshot};

use bytes::Bytes;
use ndarray::Axis;
use zerocopy::AsBytes;

/// A request for a single field: name, optional sub-columns, optional mask.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    /// Name of the field to load
    pub field: String,
    /// Names of sub-columns to restrict the second dimension to, in order
    pub columns: Option<Vec<String>>,
    /// Mask to apply to the first dimension
    pub mask: Option<MaskDescriptor>,
}

impl FieldSpec {
    /// Build a FieldSpec from validated request data.
    ///
    /// Request validation guarantees the mask fields are present together or not at all.
    pub fn from_request(request_data: &DataRequest) -> Self {
        let mask = match (
            &request_data.mask_array_json,
            request_data.mask_data_type,
            request_data.mask_size,
        ) {
            (Some(mask_array_json), Some(mask_data_type), Some(mask_size)) => {
                Some(MaskDescriptor {
                    mask_array_json: mask_array_json.clone(),
                    mask_data_type,
                    mask_size,
                })
            }
            _ => None,
        };
        FieldSpec {
            field: request_data.field.clone(),
            columns: request_data.columns.clone(),
            mask,
        }
    }
}

/// Load a field from a resolved dataset, applying the mask and column restriction if present.
///
/// The result carries the element type, shape and unit descriptor from the dataset schema.
pub fn load(handle: &ResolvedHandle, spec: &FieldSpec) -> Result<ArrayResult, GatewayError> {
    let mut snapshot = Snapshot::open(handle.path())?;
    let info = snapshot
        .field(&spec.field)
        .cloned()
        .ok_or_else(|| GatewayError::FieldNotFound {
            field: spec.field.clone(),
        })?;

    // Resolve column names against the schema before reading anything.
    let column_indices = spec
        .columns
        .as_ref()
        .map(|names| resolve_columns(&info, names))
        .transpose()?;

    // Masking is all-or-nothing: the mask is decoded and range-checked before any read.
    let (body, rows) = match &spec.mask {
        Some(descriptor) => {
            let selection = masks::decode(descriptor)?;
            let ranges = selection.to_ranges(info.row_count())?;
            let body = snapshot.read_field_rows(&info, &ranges)?;
            (body, selection.selected_rows())
        }
        None => (snapshot.read_field(&info)?, info.row_count()),
    };

    let mut shape = info.shape.clone();
    shape[0] = rows;

    let (body, shape) = match column_indices {
        Some(indices) => {
            let restricted = select_columns(&body, info.dtype, &shape, &indices)?;
            let mut shape = shape;
            shape[1] = indices.len();
            (restricted, shape)
        }
        None => (body, shape),
    };

    Ok(ArrayResult::new(body, info.dtype, shape, info.units.clone()))
}

/// Map requested column names to indices in the field's column index, in request order.
fn resolve_columns(info: &FieldInfo, names: &[String]) -> Result<Vec<usize>, GatewayError> {
    let index: &[String] = info.columns.as_deref().unwrap_or(&[]);
    names
        .iter()
        .map(|name| {
            index
                .iter()
                .position(|column| column == name)
                .ok_or_else(|| GatewayError::ColumnNotFound {
                    column: name.clone(),
                })
        })
        .collect()
}

/// Restrict the second dimension of a row-major buffer to the given column indices.
fn select_columns(
    body: &Bytes,
    dtype: DType,
    shape: &[usize],
    indices: &[usize],
) -> Result<Bytes, GatewayError> {
    match dtype {
        DType::Bool => select_columns_t::<u8>(body, shape, indices),
        DType::Int32 => select_columns_t::<i32>(body, shape, indices),
        DType::Int64 => select_columns_t::<i64>(body, shape, indices),
        DType::Uint32 => select_columns_t::<u32>(body, shape, indices),
        DType::Uint64 => select_columns_t::<u64>(body, shape, indices),
        DType::Float32 => select_columns_t::<f32>(body, shape, indices),
        DType::Float64 => select_columns_t::<f64>(body, shape, indices),
    }
}

fn select_columns_t<T: Element>(
    body: &Bytes,
    shape: &[usize],
    indices: &[usize],
) -> Result<Bytes, GatewayError> {
    let elements = array::from_bytes::<T>(body)?;
    let view = array::build_array(shape, &elements)?;
    let selected = view.select(Axis(1), indices);
    Ok(Bytes::from(selected.into_raw_vec().as_bytes().to_vec()))
}
