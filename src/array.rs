//! Functions and utilities for working with typed element buffers and [ndarray] views.
//!
//! This module also implements the wire convention shared by mask submission and array
//! responses: element buffers travel as JSON text (nested lists matching the array shape),
//! chosen so that numeric values round-trip without precision loss.

use crate::error::GatewayError;

use ndarray::ArrayViewD;
use serde_json::Value;

/// Trait for array elements.
pub trait Element:
    Clone
    + Copy
    + PartialEq
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + zerocopy::AsBytes
    + zerocopy::FromBytes
{
}

/// Blanket implementation of Element.
impl<T> Element for T where
    T: Clone
        + Copy
        + PartialEq
        + std::fmt::Debug
        + serde::Serialize
        + serde::de::DeserializeOwned
        + zerocopy::AsBytes
        + zerocopy::FromBytes
{
}

/// Convert from a byte slice to `Vec<T>`.
///
/// Zerocopy provides a mechanism for converting between types. Elements are read one at a time,
/// so no alignment of the source buffer is required.
///
/// # Arguments
///
/// * `data`: bytes containing data to convert.
pub fn from_bytes<T: zerocopy::FromBytes>(data: &[u8]) -> Result<Vec<T>, GatewayError> {
    let element_size = std::mem::size_of::<T>();
    if element_size == 0 || data.len() % element_size != 0 {
        return Err(GatewayError::CorruptDataset {
            detail: format!(
                "field data is not a valid sequence of {}",
                std::any::type_name::<T>()
            ),
        });
    }
    Ok(data
        .chunks_exact(element_size)
        .map(|chunk| T::read_from(chunk).expect("chunk length matches element size"))
        .collect())
}

/// Returns an [ndarray::ArrayView] over `data` with the given shape.
///
/// The array view borrows the data, so no copying takes place.
///
/// # Arguments
///
/// * `shape`: the shape of the array
/// * `data`: a slice of type `&[T]` containing the data to be consumed by the array view.
pub fn build_array<'a, T>(
    shape: &[usize],
    data: &'a [T],
) -> Result<ArrayViewD<'a, T>, GatewayError> {
    ArrayViewD::<T>::from_shape(shape.to_vec(), data).map_err(GatewayError::ShapeInvalid)
}

/// Convert a single element to a JSON value, rejecting values with no lossless text encoding.
fn element_value<T: Element>(element: &T) -> Result<Value, GatewayError> {
    let value = serde_json::to_value(element).map_err(|_| GatewayError::NonFiniteData)?;
    // serde_json maps non-finite floats to null rather than failing.
    if value.is_null() {
        return Err(GatewayError::NonFiniteData);
    }
    Ok(value)
}

/// Regroup a flat list of JSON values into nested lists matching `shape`.
pub fn nest_values(values: Vec<Value>, shape: &[usize]) -> Value {
    if shape.len() <= 1 {
        return Value::Array(values);
    }
    let row_len = shape[1..].iter().product::<usize>();
    if row_len == 0 {
        return Value::Array(vec![Value::Array(Vec::new()); shape[0]]);
    }
    let rows = values
        .chunks(row_len)
        .map(|row| nest_values(row.to_vec(), &shape[1..]))
        .collect();
    Value::Array(rows)
}

/// Encode a typed element buffer as JSON text under the shared wire convention.
///
/// The output is deterministic: the same elements in the same order always produce the same
/// text.
///
/// # Arguments
///
/// * `data`: elements in row-major order
/// * `shape`: the shape of the array
pub fn to_json_text<T: Element>(data: &[T], shape: &[usize]) -> Result<String, GatewayError> {
    let values = data
        .iter()
        .map(element_value)
        .collect::<Result<Vec<Value>, GatewayError>>()?;
    Ok(nest_values(values, shape).to_string())
}

/// Flatten nested JSON lists into a flat list of scalar values.
fn flatten_value(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_value(item, out);
            }
        }
        scalar => out.push(scalar),
    }
}

/// Decode JSON text under the shared wire convention into a flat element vector.
///
/// Nested lists are flattened in row-major order, so a previously returned multi-dimensional
/// array decodes to the same element sequence it was encoded from.
///
/// # Arguments
///
/// * `text`: JSON text containing a (possibly nested) list of elements
pub fn from_json_text<T: serde::de::DeserializeOwned>(
    text: &str,
) -> Result<Vec<T>, GatewayError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| GatewayError::MaskInvalid {
            detail: err.to_string(),
        })?;
    if !value.is_array() {
        return Err(GatewayError::MaskInvalid {
            detail: "expected a JSON list".to_string(),
        });
    }
    let mut scalars = Vec::new();
    flatten_value(value, &mut scalars);
    scalars
        .into_iter()
        .map(|scalar| {
            serde_json::from_value::<T>(scalar.clone()).map_err(|_| GatewayError::MaskInvalid {
                detail: format!("element {} does not match the declared data type", scalar),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    #[test]
    fn from_bytes_u32() {
        assert_eq!(
            vec![0x04030201_u32],
            from_bytes::<u32>(&[1, 2, 3, 4]).unwrap()
        );
    }

    #[test]
    fn from_bytes_i64() {
        assert_eq!(
            vec![0x0807060504030201_i64],
            from_bytes::<i64>(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap()
        );
    }

    #[test]
    fn from_bytes_f64() {
        assert_eq!(
            vec![5.447603722011605e-270_f64],
            from_bytes::<f64>(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap()
        );
    }

    fn assert_from_bytes_error<T: std::fmt::Debug>(result: Result<T, GatewayError>) {
        match result.unwrap_err() {
            GatewayError::CorruptDataset { detail: _ } => (),
            _ => panic!("expected from_bytes to fail"),
        };
    }

    #[test]
    fn from_bytes_u32_too_small() {
        assert_from_bytes_error(from_bytes::<u32>(&[1, 2, 3]))
    }

    #[test]
    fn from_bytes_u32_too_big() {
        assert_from_bytes_error(from_bytes::<u32>(&[1, 2, 3, 4, 5]))
    }

    #[test]
    fn build_array_1d() {
        let data = [1, 2, 3];
        let array = build_array(&[3], &data).unwrap();
        assert_eq!(array![1, 2, 3].into_dyn(), array);
    }

    #[test]
    fn build_array_2d() {
        let data = [1.0, 2.1, 3.2, 4.3, 5.4, 6.5];
        let array = build_array(&[2, 3], &data).unwrap();
        assert_eq!(array![[1.0, 2.1, 3.2], [4.3, 5.4, 6.5]].into_dyn(), array);
    }

    #[test]
    fn build_array_err() {
        let data = [1, 2, 3];
        match build_array(&[4], &data).unwrap_err() {
            GatewayError::ShapeInvalid(err) => {
                assert_eq!(ndarray::ErrorKind::OutOfBounds, err.kind())
            }
            _ => panic!("Expected out of bounds error"),
        }
    }

    #[test]
    fn to_json_text_1d_f64() {
        let text = to_json_text(&[1.5_f64, 2.5, -3.25], &[3]).unwrap();
        assert_eq!("[1.5,2.5,-3.25]", text);
    }

    #[test]
    fn to_json_text_2d_i64() {
        let text = to_json_text(&[1_i64, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
        assert_eq!("[[1,2,3],[4,5,6]]", text);
    }

    #[test]
    fn to_json_text_empty() {
        let text = to_json_text::<f64>(&[], &[0]).unwrap();
        assert_eq!("[]", text);
    }

    #[test]
    fn to_json_text_rejects_nan() {
        match to_json_text(&[f64::NAN], &[1]).unwrap_err() {
            GatewayError::NonFiniteData => (),
            _ => panic!("expected NonFiniteData"),
        }
    }

    #[test]
    fn to_json_text_is_deterministic() {
        let data = [0.1_f64, 0.2, 0.3];
        let first = to_json_text(&data, &[3]).unwrap();
        let second = to_json_text(&data, &[3]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn from_json_text_f64() {
        assert_eq!(
            vec![1.5_f64, 2.5],
            from_json_text::<f64>("[1.5, 2.5]").unwrap()
        );
    }

    #[test]
    fn from_json_text_nested() {
        assert_eq!(
            vec![1_i64, 2, 3, 4],
            from_json_text::<i64>("[[1, 2], [3, 4]]").unwrap()
        );
    }

    #[test]
    fn from_json_text_bool() {
        assert_eq!(
            vec![true, false, true],
            from_json_text::<bool>("[true, false, true]").unwrap()
        );
    }

    #[test]
    fn from_json_text_rejects_malformed() {
        match from_json_text::<f64>("[1.5,").unwrap_err() {
            GatewayError::MaskInvalid { detail: _ } => (),
            _ => panic!("expected MaskInvalid"),
        }
    }

    #[test]
    fn from_json_text_rejects_non_list() {
        match from_json_text::<f64>("42").unwrap_err() {
            GatewayError::MaskInvalid { detail: _ } => (),
            _ => panic!("expected MaskInvalid"),
        }
    }

    #[test]
    fn from_json_text_rejects_wrong_element_type() {
        match from_json_text::<i64>("[1.5]").unwrap_err() {
            GatewayError::MaskInvalid { detail: _ } => (),
            _ => panic!("expected MaskInvalid"),
        }
    }

    #[test]
    fn json_text_round_trip_f32() {
        let data = [0.1_f32, 1.0e-8, 3.4e38];
        let text = to_json_text(&data, &[3]).unwrap();
        assert_eq!(data.to_vec(), from_json_text::<f32>(&text).unwrap());
    }

    #[test]
    fn json_text_round_trip_f64() {
        let data = [0.1_f64, std::f64::consts::PI, 1.0e-300];
        let text = to_json_text(&data, &[3]).unwrap();
        assert_eq!(data.to_vec(), from_json_text::<f64>(&text).unwrap());
    }
}
