//! Extent-size arithmetic.
//!
//! A volume group hands out space in whole extents, so every byte request is
//! rounded up to an extent count before touching the volume manager, and the
//! provisioned size reported back to the orchestrator is always
//! `extents * extent_size`, never the raw request.

use crate::error::GeneralError;

/// Number of extents needed to hold `size_bytes`.
pub fn extents_for(size_bytes: u64, extent_size_bytes: u64) -> u64 {
    size_bytes.div_ceil(extent_size_bytes)
}

/// Resolve a requested byte count: zero means "all remaining free space".
pub fn resolve_requested_bytes(
    required_bytes: u64,
    free_extents: u64,
    extent_size_bytes: u64,
) -> u64 {
    if required_bytes == 0 {
        free_extents * extent_size_bytes
    } else {
        required_bytes
    }
}

/// Fail when the request does not fit into the group's free extents.
pub fn check_fits(extents_requested: u64, free_extents: u64) -> Result<(), GeneralError> {
    if extents_requested > free_extents {
        return Err(GeneralError::insufficient_space(format!(
            "Not enough free space: {extents_requested} extents requested, {free_extents} free."
        )));
    }
    Ok(())
}

/// Size actually allocated for an extent count.
pub fn provisioned_bytes(extents: u64, extent_size_bytes: u64) -> u64 {
    extents * extent_size_bytes
}
