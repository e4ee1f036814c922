use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lsd_dapp_interface::{DappAction, DappActionOutcome};
use metrics::counter;

use crate::config::TelemetryConfig;

pub const ACTION_EVENTS_METRIC: &str = "dapp.action.events";

/// Opt-in counters for workflow outcomes. Clones share the opt-in flag.
#[derive(Clone, Debug, Default)]
pub struct DappTelemetry {
    opt_in: Arc<AtomicBool>,
}

impl DappTelemetry {
    pub fn new(opt_in: bool) -> Self {
        Self {
            opt_in: Arc::new(AtomicBool::new(opt_in)),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.opt_in)
    }

    pub fn set_opt_in(&self, enabled: bool) {
        self.opt_in.store(enabled, Ordering::Relaxed);
    }

    pub fn opted_in(&self) -> bool {
        self.opt_in.load(Ordering::Relaxed)
    }

    pub fn record(&self, action: DappAction, outcome: DappActionOutcome) {
        if !self.opted_in() {
            return;
        }
        counter!(
            ACTION_EVENTS_METRIC,
            "operation" => action.label(),
            "outcome" => outcome.label()
        )
        .increment(1);
    }

    /// Records `Success` or `Error` depending on `result`, passing it through.
    pub fn observe<T, E>(&self, action: DappAction, result: Result<T, E>) -> Result<T, E> {
        let outcome = if result.is_ok() {
            DappActionOutcome::Success
        } else {
            DappActionOutcome::Error
        };
        self.record(action, outcome);
        result
    }
}
