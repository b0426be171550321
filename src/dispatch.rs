//! Two-phase buzzer actuation: activate, hold, deactivate.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert_log::{AlertLog, AlertRecord};
use crate::webfleet::VehicleApi;

/// Phases of a single dispatch attempt.
///
/// Activation failure is the only early exit; once the output is on, the
/// attempt counts as successful even if switching it back off fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Activating,
    ActivateFailed,
    Active,
    Holding,
    Deactivating,
    DeactivateFailed,
    Done,
}

/// Drives the activate / hold / deactivate sequence against the remote API
/// and owns the growing alert log.
pub struct AlertDispatcher<A> {
    api: Arc<A>,
    output_name: String,
    log: AlertLog,
}

impl<A: VehicleApi> AlertDispatcher<A> {
    pub fn new(api: Arc<A>, output_name: String) -> Self {
        Self {
            api,
            output_name,
            log: AlertLog::new(),
        }
    }

    /// Runs one full actuation sequence for a vehicle and returns the
    /// resulting record. The record is appended to the log regardless of
    /// outcome.
    ///
    /// `shutdown` interrupts the hold promptly; the sequence still proceeds
    /// to deactivation so the output is not left latched on.
    pub async fn dispatch(
        &mut self,
        vehicle_id: &str,
        location_label: &str,
        reason: &str,
        duration_secs: u64,
        shutdown: &CancellationToken,
    ) -> AlertRecord {
        let timestamp = Utc::now();
        let mut activation_response = None;
        let mut deactivation_response = None;
        let mut success = false;

        info!(
            vehicle_id,
            location = location_label,
            duration_secs,
            "Dispatching alert"
        );

        let mut phase = Phase::Activating;
        loop {
            phase = match phase {
                Phase::Activating => {
                    match self
                        .api
                        .switch_output(vehicle_id, &self.output_name, true, duration_secs)
                        .await
                    {
                        Ok(response) => {
                            activation_response = Some(compact(&response));
                            Phase::Active
                        }
                        Err(e) => {
                            warn!(vehicle_id, error = %e, "Buzzer activation failed");
                            activation_response = Some(e.to_string());
                            Phase::ActivateFailed
                        }
                    }
                }
                Phase::Active => {
                    success = true;
                    Phase::Holding
                }
                Phase::Holding => {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {}
                        _ = shutdown.cancelled() => {
                            debug!(vehicle_id, "Hold interrupted by shutdown");
                        }
                    }
                    Phase::Deactivating
                }
                Phase::Deactivating => {
                    match self
                        .api
                        .switch_output(vehicle_id, &self.output_name, false, 0)
                        .await
                    {
                        Ok(response) => {
                            deactivation_response = Some(compact(&response));
                            Phase::Done
                        }
                        Err(e) => {
                            // The audible alert already happened; log the
                            // stuck output but keep the attempt successful.
                            warn!(vehicle_id, error = %e, "Buzzer deactivation failed");
                            deactivation_response = Some(e.to_string());
                            Phase::DeactivateFailed
                        }
                    }
                }
                Phase::ActivateFailed | Phase::DeactivateFailed | Phase::Done => break,
            };
        }

        let record = AlertRecord {
            timestamp,
            vehicle_id: vehicle_id.to_string(),
            location_label: location_label.to_string(),
            reason: reason.to_string(),
            duration_secs,
            activation_response,
            deactivation_response,
            success,
        };

        if record.success {
            info!(vehicle_id, location = location_label, "Alert delivered");
        }

        self.log.append(record.clone());
        record
    }

    pub fn log(&self) -> &AlertLog {
        &self.log
    }

    pub fn flush_log(&mut self, path: &str) -> anyhow::Result<()> {
        self.log.flush(path)
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}
