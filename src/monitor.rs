//! The polling loop tying fetch, classification, dedup, cooldown, and
//! dispatch together.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert_log::AlertRecord;
use crate::config::MonitorConfig;
use crate::cooldown::CooldownTracker;
use crate::dedup::DedupStore;
use crate::dispatch::AlertDispatcher;
use crate::event::{Severity, classify, extract_events};
use crate::webfleet::VehicleApi;

/// Today's events; the feed re-reports within this window, which is what
/// the dedup store absorbs.
const RANGE_TODAY: &str = "d0";

/// What one poll cycle saw and did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub actionable: usize,
    pub deduplicated: usize,
    pub cooled_down: usize,
    pub dispatched: usize,
}

/// Owns the polling state (dedup store, cooldown tracker, dispatcher) for
/// the lifetime of the loop. Single-threaded: one cycle completes before the
/// next fetch, so a dispatch hold delays the rest of its batch.
pub struct Monitor<A> {
    api: Arc<A>,
    config: MonitorConfig,
    dedup: DedupStore,
    cooldown: CooldownTracker,
    dispatcher: AlertDispatcher<A>,
}

impl<A: VehicleApi> Monitor<A> {
    pub fn new(api: Arc<A>, config: MonitorConfig) -> Self {
        let dedup = DedupStore::new(config.dedup_ceiling);
        let cooldown = CooldownTracker::new(chrono::Duration::minutes(config.cooldown_minutes));
        let dispatcher = AlertDispatcher::new(api.clone(), config.buzzer_output_name.clone());
        Self {
            api,
            config,
            dedup,
            cooldown,
            dispatcher,
        }
    }

    /// Runs the poll loop until `shutdown` is cancelled, then flushes the
    /// alert log and returns.
    ///
    /// No fetch or dispatch error terminates the loop; failures are logged
    /// and the next cycle retries naturally.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        info!(
            output = %self.config.buzzer_output_name,
            duration_secs = self.config.buzzer_duration,
            poll_interval_secs = self.config.poll_interval,
            cooldown_minutes = self.config.cooldown_minutes,
            "Monitoring active"
        );

        while !shutdown.is_cancelled() {
            match self.poll_once(&shutdown).await {
                Ok(stats) if stats.dispatched > 0 => {
                    info!(
                        fetched = stats.fetched,
                        dispatched = stats.dispatched,
                        "Poll cycle complete"
                    );
                    if let Err(e) = self.dispatcher.flush_log(&self.config.alert_log_path) {
                        warn!(error = %e, "Failed to flush alert log");
                    }
                }
                Ok(stats) => {
                    debug!(fetched = stats.fetched, "Poll cycle complete, nothing to do");
                }
                Err(e) => {
                    warn!(error = %e, "Poll cycle failed, retrying next interval");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(self.config.poll_interval)) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Monitoring stopped");
        self.dispatcher.flush_log(&self.config.alert_log_path)?;
        Ok(())
    }

    /// Executes a single fetch-classify-filter-dispatch cycle.
    pub async fn poll_once(&mut self, shutdown: &CancellationToken) -> Result<CycleStats> {
        let mut stats = CycleStats::default();

        let payload = tokio::select! {
            result = self.api.fetch_events(RANGE_TODAY, Severity::Warning) => result?,
            _ = shutdown.cancelled() => return Ok(stats),
        };

        let batch = extract_events(&payload);
        stats.fetched = batch.len();
        debug!(fetched = batch.len(), "Event batch received");

        for raw in &batch {
            if shutdown.is_cancelled() {
                break;
            }

            let Some(event) = classify(raw) else {
                continue;
            };
            stats.actionable += 1;

            if self.dedup.seen(&event.event_id) {
                stats.deduplicated += 1;
                continue;
            }
            // Mark before the cooldown check: the event itself must not be
            // reprocessed even when the alert is suppressed.
            self.dedup.mark(&event.event_id);

            let now = Utc::now();
            if !self.cooldown.may_alert(&event.vehicle_id, now) {
                debug!(vehicle_id = %event.vehicle_id, "Vehicle in cooldown, alert suppressed");
                stats.cooled_down += 1;
                continue;
            }
            // Recorded at decision time, not after actuation, so an overlap
            // during a slow switch call cannot double-trigger the vehicle.
            self.cooldown.record(&event.vehicle_id, now);

            let reason = format!("Zone entry: {}", event.location_label);
            self.dispatcher
                .dispatch(
                    &event.vehicle_id,
                    &event.location_label,
                    &reason,
                    self.config.buzzer_duration,
                    shutdown,
                )
                .await;
            stats.dispatched += 1;
        }

        if self.dedup.over_ceiling() {
            let before = self.dedup.len();
            self.dedup.compact();
            debug!(before, after = self.dedup.len(), "Dedup store compacted");
        }

        Ok(stats)
    }

    pub fn alert_log(&self) -> &crate::alert_log::AlertLog {
        self.dispatcher.log()
    }

    /// Fires a single manual alert, bypassing classification and filtering.
    pub async fn trigger_once(
        &mut self,
        vehicle_id: &str,
        location_label: &str,
        reason: &str,
        duration_secs: u64,
    ) -> Result<AlertRecord> {
        let record = self
            .dispatcher
            .dispatch(
                vehicle_id,
                location_label,
                reason,
                duration_secs,
                &CancellationToken::new(),
            )
            .await;
        self.dispatcher.flush_log(&self.config.alert_log_path)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webfleet::ApiError;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Feed mock: pops one scripted batch per fetch and records every
    /// switch-output call.
    #[derive(Default)]
    struct FeedApi {
        batches: Mutex<VecDeque<Value>>,
        fail_fetch: bool,
        switches: Mutex<Vec<(String, bool)>>,
    }

    impl FeedApi {
        fn with_batches(batches: Vec<Value>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                ..Default::default()
            }
        }

        fn switch_calls(&self) -> Vec<(String, bool)> {
            self.switches.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl VehicleApi for FeedApi {
        async fn fetch_events(
            &self,
            _range_pattern: &str,
            _severity: Severity,
        ) -> Result<Value, ApiError> {
            if self.fail_fetch {
                return Err(ApiError::Decode {
                    message: "not json".to_string(),
                });
            }
            Ok(self
                .batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| json!([])))
        }

        async fn switch_output(
            &self,
            vehicle_id: &str,
            _output_name: &str,
            active: bool,
            _duration_secs: u64,
        ) -> Result<Value, ApiError> {
            self.switches
                .lock()
                .unwrap()
                .push((vehicle_id.to_string(), active));
            Ok(json!({"status": "ok"}))
        }
    }

    fn zone_entry(event_id: &str, vehicle: &str) -> Value {
        json!({
            "event_id": event_id,
            "objectno": vehicle,
            "eventlevel_cur": "W",
            "msgtext": format!("Entering area Bridge {vehicle}"),
        })
    }

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            alert_log_path: std::env::temp_dir()
                .join("low_bridge_monitor_test.csv")
                .to_str()
                .unwrap()
                .to_string(),
            buzzer_duration: 1,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_dispatches_actionable_event() {
        let api = Arc::new(FeedApi::with_batches(vec![json!([
            zone_entry("E1", "V1")
        ])]));
        let mut monitor = Monitor::new(api.clone(), test_config());

        let stats = monitor.poll_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.actionable, 1);
        assert_eq!(stats.dispatched, 1);

        // Activate then deactivate on the same vehicle.
        assert_eq!(
            api.switch_calls(),
            vec![("V1".to_string(), true), ("V1".to_string(), false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_event_across_polls_dispatches_once() {
        let api = Arc::new(FeedApi::with_batches(vec![
            json!([zone_entry("E1", "V1")]),
            json!([zone_entry("E1", "V1")]),
        ]));
        let mut monitor = Monitor::new(api.clone(), test_config());
        let shutdown = CancellationToken::new();

        let first = monitor.poll_once(&shutdown).await.unwrap();
        let second = monitor.poll_once(&shutdown).await.unwrap();

        assert_eq!(first.dispatched, 1);
        assert_eq!(second.dispatched, 0);
        assert_eq!(second.deduplicated, 1);
        assert_eq!(api.switch_calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_suppresses_second_vehicle_alert() {
        // Distinct event ids, same vehicle, same cycle.
        let api = Arc::new(FeedApi::with_batches(vec![json!([
            zone_entry("E1", "V1"),
            zone_entry("E2", "V1"),
        ])]));
        let mut monitor = Monitor::new(api.clone(), test_config());

        let stats = monitor.poll_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(stats.dispatched, 1);
        assert_eq!(stats.cooled_down, 1);
        // Suppressed event is still marked seen.
        assert_eq!(monitor.dedup.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_noise_records_are_skipped_silently() {
        let api = Arc::new(FeedApi::with_batches(vec![json!([
            {"objectno": "V1", "eventlevel_cur": "N", "msgtext": "Entering area X"},
            {"objectno": "V1", "eventlevel_cur": "W", "msgtext": "Output Low Bridge switched ON"},
            {"unrecognized": true},
        ])]));
        let mut monitor = Monitor::new(api.clone(), test_config());

        let stats = monitor.poll_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(stats.fetched, 3);
        assert_eq!(stats.actionable, 0);
        assert!(api.switch_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_is_reported_not_fatal() {
        let api = Arc::new(FeedApi {
            fail_fetch: true,
            ..Default::default()
        });
        let mut monitor = Monitor::new(api, test_config());

        assert!(monitor.poll_once(&CancellationToken::new()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_event_ids_do_not_suppress_each_other() {
        let api = Arc::new(FeedApi::with_batches(vec![json!([
            {"objectno": "V1", "eventlevel_cur": "W", "msgtext": "Entering area A"},
            {"objectno": "V2", "eventlevel_cur": "W", "msgtext": "Entering area B"},
        ])]));
        let mut monitor = Monitor::new(api.clone(), test_config());

        let stats = monitor.poll_once(&CancellationToken::new()).await.unwrap();
        // Both lack ids; neither is deduplicated away.
        assert_eq!(stats.dispatched, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_compaction_runs_after_batch() {
        let batch: Vec<Value> = (0..8).map(|i| zone_entry(&format!("E{i}"), &format!("V{i}"))).collect();
        let api = Arc::new(FeedApi::with_batches(vec![json!(batch)]));
        let mut config = test_config();
        config.dedup_ceiling = 6;
        let mut monitor = Monitor::new(api, config);

        monitor.poll_once(&CancellationToken::new()).await.unwrap();
        // 8 marked > ceiling 6, compacted down to ceiling/2.
        assert_eq!(monitor.dedup.len(), 3);
    }
}
