use std::sync::Arc;

use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::warn;

use marquee_shared::{HoldEvent, HoldEventKind};

/// Service metrics on a private registry, rendered at `/metrics`.
pub struct ApiMetrics {
    registry: Registry,
    pub hold_events: IntCounterVec,
    pub hold_rejections: IntCounterVec,
    pub stream_clients: IntGauge,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let hold_events = IntCounterVec::new(
            Opts::new("marquee_hold_events_total", "Hold lifecycle transitions by kind"),
            &["kind"],
        )?;
        let hold_rejections = IntCounterVec::new(
            Opts::new("marquee_hold_rejections_total", "Refused hold operations by error code"),
            &["code"],
        )?;
        let stream_clients = IntGauge::new(
            "marquee_stream_clients",
            "Open server-sent event streams",
        )?;

        registry.register(Box::new(hold_events.clone()))?;
        registry.register(Box::new(hold_rejections.clone()))?;
        registry.register(Box::new(stream_clients.clone()))?;

        Ok(Self {
            registry,
            hold_events,
            hold_rejections,
            stream_clients,
        })
    }

    pub fn record_event(&self, event: &HoldEvent) {
        let kind = match event.kind {
            HoldEventKind::Created => "created",
            HoldEventKind::Confirmed => "confirmed",
            HoldEventKind::Released => "released",
            HoldEventKind::Expired => "expired",
        };
        self.hold_events.with_label_values(&[kind]).inc();
    }

    pub fn record_rejection(&self, code: &str) {
        self.hold_rejections.with_label_values(&[code]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

/// Counts every lifecycle event, including those raised by the sweeper.
pub fn spawn_event_counter(
    mut events: broadcast::Receiver<HoldEvent>,
    metrics: Arc<ApiMetrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => metrics.record_event(&event),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Event counter lagged, {} events not counted", missed)
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Keeps `stream_clients` accurate for as long as one SSE stream lives.
pub struct StreamClientGuard(IntGauge);

impl StreamClientGuard {
    pub fn new(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for StreamClientGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}
