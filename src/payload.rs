//! Response serialisation.
//!
//! Converts loaded array results into transport-safe payloads and back. The element buffer
//! travels as JSON text under the same convention the mask codec accepts on the way in, so a
//! client can resubmit a previously received array as a future mask without reformatting.
//! Encoding is deterministic, and `deserialize(serialize(result))` reproduces the result
//! exactly for all finite data.

use crate::array::{self, Element};
use crate::error::GatewayError;
use crate::models::{ArrayPayload, ArrayResult, DType};

use bytes::Bytes;
use serde_json::Value;
use zerocopy::AsBytes;

/// Serialise an array result into a transport payload.
pub fn serialize(result: &ArrayResult) -> Result<ArrayPayload, GatewayError> {
    let data = match result.dtype {
        DType::Bool => encode_bool(&result.body, &result.shape)?,
        DType::Int32 => encode_t::<i32>(&result.body, &result.shape)?,
        DType::Int64 => encode_t::<i64>(&result.body, &result.shape)?,
        DType::Uint32 => encode_t::<u32>(&result.body, &result.shape)?,
        DType::Uint64 => encode_t::<u64>(&result.body, &result.shape)?,
        DType::Float32 => encode_t::<f32>(&result.body, &result.shape)?,
        DType::Float64 => encode_t::<f64>(&result.body, &result.shape)?,
    };
    Ok(ArrayPayload {
        dtype: result.dtype,
        shape: result.shape.clone(),
        units: result.units.clone(),
        data,
    })
}

/// Deserialise a transport payload back into an array result.
///
/// This is the decode direction of the shared wire convention, so malformed contents are
/// reported through the same error as mask decoding.
pub fn deserialize(payload: &ArrayPayload) -> Result<ArrayResult, GatewayError> {
    let body = match payload.dtype {
        DType::Bool => array::from_json_text::<bool>(&payload.data)?
            .into_iter()
            .map(u8::from)
            .collect::<Vec<u8>>(),
        DType::Int32 => decode_t::<i32>(&payload.data)?,
        DType::Int64 => decode_t::<i64>(&payload.data)?,
        DType::Uint32 => decode_t::<u32>(&payload.data)?,
        DType::Uint64 => decode_t::<u64>(&payload.data)?,
        DType::Float32 => decode_t::<f32>(&payload.data)?,
        DType::Float64 => decode_t::<f64>(&payload.data)?,
    };
    let expected = payload.shape.iter().product::<usize>() * payload.dtype.size_of();
    if body.len() != expected {
        return Err(GatewayError::MaskInvalid {
            detail: "decoded element count does not match the declared shape".to_string(),
        });
    }
    Ok(ArrayResult::new(
        Bytes::from(body),
        payload.dtype,
        payload.shape.clone(),
        payload.units.clone(),
    ))
}

fn encode_t<T: Element>(body: &[u8], shape: &[usize]) -> Result<String, GatewayError> {
    let elements = array::from_bytes::<T>(body)?;
    check_element_count(elements.len(), shape)?;
    array::to_json_text(&elements, shape)
}

/// Boolean buffers hold one byte per element; encode them as JSON booleans.
fn encode_bool(body: &[u8], shape: &[usize]) -> Result<String, GatewayError> {
    check_element_count(body.len(), shape)?;
    let values = body
        .iter()
        .map(|byte| Value::Bool(*byte != 0))
        .collect::<Vec<Value>>();
    Ok(array::nest_values(values, shape).to_string())
}

fn decode_t<T: Element>(text: &str) -> Result<Vec<u8>, GatewayError> {
    let elements = array::from_json_text::<T>(text)?;
    Ok(elements.as_bytes().to_vec())
}

/// The buffer length must be consistent with shape and element width.
fn check_element_count(actual: usize, shape: &[usize]) -> Result<(), GatewayError> {
    let expected = shape.iter().product::<usize>();
    if actual != expected {
        return Err(GatewayError::CorruptDataset {
            detail: "buffer length does not match field shape".to_string(),
        });
    }
    Ok(())
}
