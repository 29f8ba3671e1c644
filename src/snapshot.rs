//! Particle snapshot container format.
//!
//! A snapshot file is an 8 byte magic, a little-endian `u64` header length, a JSON header and a
//! raw little-endian data section. The header carries the unit system and an ordered field
//! table; each field records its element type, shape, optional units, optional column names for
//! the second dimension, and its byte extent within the data section.
//!
//! [Snapshot::open] reads and validates the header only; bulk data is read lazily, either as a
//! whole field or as a list of row ranges so that masked requests touch only the selected
//! bytes.

use crate::error::GatewayError;
use crate::models::DType;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::Path;

/// File magic, including a format version byte.
const MAGIC: [u8; 8] = *b"PSNAP\x01\x00\x00";

/// Upper bound on the JSON header size.
const MAX_HEADER_BYTES: u64 = 16 * 1024 * 1024;

/// Description of a single field in the snapshot header.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Element type
    pub dtype: DType,
    /// Shape; the first dimension is the particle count
    pub shape: Vec<usize>,
    /// Unit descriptor, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Column names for the second dimension, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Byte offset within the data section
    pub offset: u64,
    /// Byte length within the data section
    pub nbytes: u64,
}

impl FieldInfo {
    /// Returns the length of the first dimension.
    pub fn row_count(&self) -> usize {
        self.shape[0]
    }

    /// Returns the size in bytes of one row of the field.
    pub fn row_nbytes(&self) -> usize {
        self.shape[1..].iter().product::<usize>() * self.dtype.size_of()
    }
}

/// Snapshot header as stored on disk.
#[derive(Debug, Deserialize, Serialize)]
struct SnapshotHeader {
    /// Unit system of the dataset
    #[serde(default)]
    units: BTreeMap<String, String>,
    /// Ordered field table
    fields: Vec<FieldInfo>,
}

/// An open snapshot with a parsed header.
///
/// Holds the underlying file handle; dropping the snapshot releases it.
#[derive(Debug)]
pub struct Snapshot {
    file: File,
    data_start: u64,
    units: BTreeMap<String, String>,
    fields: Vec<FieldInfo>,
}

/// Return a `CorruptDataset` error with the given detail.
fn corrupt(detail: impl Into<String>) -> GatewayError {
    GatewayError::CorruptDataset {
        detail: detail.into(),
    }
}

impl Snapshot {
    /// Open a snapshot and parse its header.
    ///
    /// Reads structural information only; no field data is materialised.
    pub fn open(path: &Path) -> Result<Self, GatewayError> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let mut magic = [0_u8; 8];
        file.read_exact(&mut magic)
            .map_err(|_| corrupt("file too short for header"))?;
        if magic != MAGIC {
            return Err(corrupt("unrecognised file magic"));
        }

        let mut header_len_bytes = [0_u8; 8];
        file.read_exact(&mut header_len_bytes)
            .map_err(|_| corrupt("file too short for header"))?;
        let header_len = u64::from_le_bytes(header_len_bytes);
        if header_len > MAX_HEADER_BYTES {
            return Err(corrupt("header length exceeds limit"));
        }

        let mut header_bytes = vec![0_u8; header_len as usize];
        file.read_exact(&mut header_bytes)
            .map_err(|_| corrupt("file too short for header"))?;
        let header: SnapshotHeader = serde_json::from_slice(&header_bytes)
            .map_err(|err| corrupt(format!("invalid header: {}", err)))?;

        let data_start = 16 + header_len;
        for field in &header.fields {
            if field.shape.is_empty() || field.shape.len() > 2 {
                return Err(corrupt(format!(
                    "field {} must have one or two dimensions",
                    field.name
                )));
            }
            let expected = field.shape.iter().product::<usize>() * field.dtype.size_of();
            if field.nbytes as usize != expected {
                return Err(corrupt(format!(
                    "field {} length {} does not match shape and dtype",
                    field.name, field.nbytes
                )));
            }
            if let Some(columns) = &field.columns {
                if field.shape.len() != 2 || columns.len() != field.shape[1] {
                    return Err(corrupt(format!(
                        "field {} column names do not match its second dimension",
                        field.name
                    )));
                }
            }
            let end = data_start
                .checked_add(field.offset)
                .and_then(|start| start.checked_add(field.nbytes));
            match end {
                Some(end) if end <= file_len => (),
                _ => {
                    return Err(corrupt(format!(
                        "field {} data extends beyond end of file",
                        field.name
                    )))
                }
            }
        }

        Ok(Snapshot {
            file,
            data_start,
            units: header.units,
            fields: header.fields,
        })
    }

    /// Returns the unit system of the dataset.
    pub fn units(&self) -> &BTreeMap<String, String> {
        &self.units
    }

    /// Returns the ordered field table.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Returns the field with the given name, if present.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Read a whole field.
    pub fn read_field(&mut self, info: &FieldInfo) -> Result<Bytes, GatewayError> {
        self.read_extent(info.offset, info.nbytes as usize)
    }

    /// Read a list of row ranges from a field, one seek and read per range.
    ///
    /// Ranges are read in the order given and concatenated, so callers control the row order of
    /// the result.
    pub fn read_field_rows(
        &mut self,
        info: &FieldInfo,
        ranges: &[Range<u64>],
    ) -> Result<Bytes, GatewayError> {
        let row_nbytes = info.row_nbytes() as u64;
        let total_rows = ranges.iter().map(|range| range.end - range.start).sum::<u64>();
        let mut buffer = Vec::with_capacity((total_rows * row_nbytes) as usize);
        for range in ranges {
            let offset = info.offset + range.start * row_nbytes;
            let nbytes = (range.end - range.start) * row_nbytes;
            self.file.seek(SeekFrom::Start(self.data_start + offset))?;
            let mut chunk = vec![0_u8; nbytes as usize];
            self.file.read_exact(&mut chunk)?;
            buffer.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buffer))
    }

    fn read_extent(&mut self, offset: u64, nbytes: usize) -> Result<Bytes, GatewayError> {
        self.file.seek(SeekFrom::Start(self.data_start + offset))?;
        let mut buffer = vec![0_u8; nbytes];
        self.file.read_exact(&mut buffer)?;
        Ok(Bytes::from(buffer))
    }
}

/// Field contents handed to [write_snapshot].
#[derive(Clone, Debug)]
pub struct FieldData {
    /// Field name
    pub name: String,
    /// Element type
    pub dtype: DType,
    /// Shape; the first dimension is the particle count
    pub shape: Vec<usize>,
    /// Unit descriptor, if any
    pub units: Option<String>,
    /// Column names for the second dimension, if any
    pub columns: Option<Vec<String>>,
    /// Raw little-endian element buffer
    pub data: Vec<u8>,
}

/// Write a snapshot file.
///
/// Field data is laid out contiguously in the order given.
pub fn write_snapshot(
    path: &Path,
    units: &BTreeMap<String, String>,
    fields: &[FieldData],
) -> Result<(), GatewayError> {
    let mut offset = 0_u64;
    let infos = fields
        .iter()
        .map(|field| {
            let info = FieldInfo {
                name: field.name.clone(),
                dtype: field.dtype,
                shape: field.shape.clone(),
                units: field.units.clone(),
                columns: field.columns.clone(),
                offset,
                nbytes: field.data.len() as u64,
            };
            offset += field.data.len() as u64;
            info
        })
        .collect();
    let header = SnapshotHeader {
        units: units.clone(),
        fields: infos,
    };
    let header_bytes = serde_json::to_vec(&header)
        .map_err(|err| corrupt(format!("failed to serialise header: {}", err)))?;

    let mut file = File::create(path)?;
    file.write_all(&MAGIC)?;
    file.write_all(&(header_bytes.len() as u64).to_le_bytes())?;
    file.write_all(&header_bytes)?;
    for field in fields {
        file.write_all(&field.data)?;
    }
    file.flush()?;
    Ok(())
}
