//! Mask decoding.
//!
//! A mask arrives as JSON text together with its element type and declared size. Decoding
//! classifies it into a tagged [Selection]: a boolean mask selecting rows where true, or an
//! index mask listing rows explicitly. Selections lower to row ranges for the loader;
//! consecutive rows coalesce into a single range so masked reads stay sequential where the
//! selection allows it.

use crate::array;
use crate::error::GatewayError;
use crate::models::DType;

use std::ops::Range;

/// A client-supplied serialised mask.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskDescriptor {
    /// Serialised mask contents as JSON text
    pub mask_array_json: String,
    /// Element type of the mask values
    pub mask_data_type: DType,
    /// Declared number of mask elements
    pub mask_size: usize,
}

/// A decoded selection over the first dimension of a field.
///
/// The mask kind is decided once, at decode time.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    /// Boolean mask; selects rows where true, in ascending row order.
    Bool(Vec<bool>),
    /// Index mask; selects the listed rows in the order given, duplicates permitted.
    Index(Vec<i64>),
}

/// Decode a mask descriptor into a [Selection].
///
/// The serialised contents are parsed against the declared element type, and the decoded
/// element count must equal the declared size. Field shape is not known here; length and range
/// checks against the target field happen when the selection is applied.
pub fn decode(descriptor: &MaskDescriptor) -> Result<Selection, GatewayError> {
    let selection = match descriptor.mask_data_type {
        DType::Bool => Selection::Bool(array::from_json_text(&descriptor.mask_array_json)?),
        DType::Int32 => Selection::Index(
            array::from_json_text::<i32>(&descriptor.mask_array_json)?
                .into_iter()
                .map(i64::from)
                .collect(),
        ),
        DType::Int64 => Selection::Index(array::from_json_text(&descriptor.mask_array_json)?),
        DType::Uint32 => Selection::Index(
            array::from_json_text::<u32>(&descriptor.mask_array_json)?
                .into_iter()
                .map(i64::from)
                .collect(),
        ),
        DType::Uint64 => Selection::Index(
            array::from_json_text::<u64>(&descriptor.mask_array_json)?
                .into_iter()
                .map(|index| {
                    i64::try_from(index).map_err(|_| GatewayError::MaskInvalid {
                        detail: format!("index {} is too large", index),
                    })
                })
                .collect::<Result<Vec<i64>, GatewayError>>()?,
        ),
        DType::Float32 | DType::Float64 => {
            return Err(GatewayError::MaskInvalid {
                detail: "mask data type must be bool or integer".to_string(),
            })
        }
    };

    let actual = selection.len();
    if actual != descriptor.mask_size {
        return Err(GatewayError::MaskSizeMismatch {
            declared: descriptor.mask_size,
            actual,
        });
    }
    Ok(selection)
}

impl Selection {
    /// Returns the number of mask elements.
    pub fn len(&self) -> usize {
        match self {
            Selection::Bool(flags) => flags.len(),
            Selection::Index(indices) => indices.len(),
        }
    }

    /// Returns whether the mask has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of rows the selection produces.
    pub fn selected_rows(&self) -> usize {
        match self {
            Selection::Bool(flags) => flags.iter().filter(|flag| **flag).count(),
            Selection::Index(indices) => indices.len(),
        }
    }

    /// Lower the selection to row ranges over a field of the given length.
    ///
    /// Boolean masks must match the field length exactly; index masks may have any length but
    /// every index must lie within `[0, field_len)`. Any violation fails the whole selection.
    /// Consecutive rows coalesce into a single range, preserving selection order.
    pub fn to_ranges(&self, field_len: usize) -> Result<Vec<Range<u64>>, GatewayError> {
        match self {
            Selection::Bool(flags) => {
                if flags.len() != field_len {
                    return Err(GatewayError::MaskLengthMismatch {
                        mask: flags.len(),
                        field: field_len,
                    });
                }
                let mut ranges: Vec<Range<u64>> = Vec::new();
                for (row, flag) in flags.iter().enumerate() {
                    if !*flag {
                        continue;
                    }
                    let row = row as u64;
                    match ranges.last_mut() {
                        Some(last) if last.end == row => last.end = row + 1,
                        _ => ranges.push(row..row + 1),
                    }
                }
                Ok(ranges)
            }
            Selection::Index(indices) => {
                let mut ranges: Vec<Range<u64>> = Vec::new();
                for index in indices {
                    if *index < 0 || *index as usize >= field_len {
                        return Err(GatewayError::MaskIndexOutOfRange {
                            index: *index,
                            length: field_len,
                        });
                    }
                    let row = *index as u64;
                    match ranges.last_mut() {
                        Some(last) if last.end == row => last.end = row + 1,
                        _ => ranges.push(row..row + 1),
                    }
                }
                Ok(ranges)
            }
        }
    }
}
