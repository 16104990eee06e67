//! Input validation and small numeric/time helpers shared by the service and
//! its tests.
//!
//! Everything that arrives over the wire goes through here before touching the
//! pipeline or the pending store, so a malformed request can never panic a
//! handler or grow the persisted document without bound.

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDateTime};

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Largest accepted image upload (16 MiB)
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Maximum length of a plate string submitted to the pending queue.
///
/// Plates are 6-9 characters once formatted; the slack allows for operator
/// typing noise that gets trimmed.
pub const MAX_PLATE_LENGTH: usize = 32;

/// Maximum length of an image reference stored with a pending entry.
///
/// References may be inline data URLs of an uploaded capture, so the cap
/// follows the upload limit.
pub const MAX_IMAGE_REFERENCE_LENGTH: usize = MAX_UPLOAD_BYTES;

// ============================================================================
// String Validation
// ============================================================================

/// Validate string length against a maximum
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Validate non-empty string
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Validate a plate string submitted for manual review
pub fn validate_plate_input(plate: &str) -> Result<()> {
    validate_non_empty(plate, "placa")?;
    validate_length(plate.trim(), MAX_PLATE_LENGTH, "placa")
}

/// Validate an uploaded payload size
pub fn validate_upload_size(len: usize) -> Result<()> {
    if len > MAX_UPLOAD_BYTES {
        return Err(anyhow!(
            "upload exceeds maximum size of {} bytes (got {})",
            MAX_UPLOAD_BYTES,
            len
        ));
    }
    Ok(())
}

// ============================================================================
// Numeric / Time Helpers
// ============================================================================

/// Round half away from zero to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Current local wall-clock time without offset, the format the pending
/// document has always used (`2024-05-01T10:22:03.123456`)
pub fn local_timestamp() -> NaiveDateTime {
    Local::now().naive_local()
}

// ============================================================================
// Tests
// ============================================================================
