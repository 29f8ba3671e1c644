//! Dataset metadata access.
//!
//! Returns the unit system and schema of a resolved dataset. Only the snapshot header is read;
//! bulk particle data is never materialised here.

use crate::error::GatewayError;
use crate::models::{FieldMeta, MetadataResponse};
use crate::resolver::ResolvedHandle;
use crate::snapshot::Snapshot;

/// Retrieve unit system and structural metadata for a resolved dataset.
pub fn dataset_metadata(handle: &ResolvedHandle) -> Result<MetadataResponse, GatewayError> {
    let snapshot = Snapshot::open(handle.path())?;
    let fields = snapshot
        .fields()
        .iter()
        .map(|info| {
            (
                info.name.clone(),
                FieldMeta {
                    dtype: info.dtype,
                    shape: info.shape.clone(),
                    units: info.units.clone(),
                    columns: info.columns.clone(),
                },
            )
        })
        .collect();
    Ok(MetadataResponse {
        units: snapshot.units().clone(),
        fields,
    })
}
