//! Trait boundary for the remote vehicle API.

use serde_json::Value;

use super::error::ApiError;
use crate::event::Severity;

/// Abstraction over the remote telemetry/actuation service.
///
/// The production implementation is [`super::WebfleetClient`]; tests script
/// their own implementations to drive the dispatcher and the poll loop
/// without a network.
#[async_trait::async_trait]
pub trait VehicleApi: Send + Sync {
    /// Fetches raw event reports for the given range pattern (e.g. `"d0"`
    /// for today), filtered to the given severity.
    ///
    /// Returns the raw response payload; the caller extracts individual
    /// event records from whichever shape the feed used. An empty batch is
    /// a valid, non-error result.
    async fn fetch_events(&self, range_pattern: &str, severity: Severity)
    -> Result<Value, ApiError>;

    /// Switches a named external output on a vehicle on or off.
    ///
    /// `duration_secs` is passed through to the remote side as the requested
    /// switch duration. Returns the API response payload on success.
    async fn switch_output(
        &self,
        vehicle_id: &str,
        output_name: &str,
        active: bool,
        duration_secs: u64,
    ) -> Result<Value, ApiError>;
}
