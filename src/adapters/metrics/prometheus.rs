//! Prometheus Metrics Registry - Feed Observability
//!
//! Counts classified frames, discards and decode failures, tracks the
//! lifecycle state as a gauge. All metrics are prefixed `md_feed_`.

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::domain::frame::FrameCategory;
use crate::domain::lifecycle::SessionState;

/// Centralized Prometheus metrics for one feed session.
///
/// Owns its registry so several sessions (or tests) never collide on
/// registration.
pub struct FeedMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Frames dispatched to a handler, by category.
    pub frames_dispatched: IntCounterVec,
    /// Frames discarded before reaching a handler, by reason.
    pub frames_discarded: IntCounterVec,
    /// Inbound frames that failed to decode.
    pub decode_errors: IntCounter,
    /// Subscription requests sent.
    pub subscriptions_sent: IntCounter,
    /// Current lifecycle state code (see `SessionState::code`).
    pub lifecycle_state: IntGauge,
}

impl FeedMetrics {
    /// Create and register all metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let frames_dispatched = IntCounterVec::new(
            Opts::new(
                "md_feed_frames_dispatched_total",
                "Inbound frames routed to a handler",
            ),
            &["category"],
        )?;

        let frames_discarded = IntCounterVec::new(
            Opts::new(
                "md_feed_frames_discarded_total",
                "Inbound frames dropped by the classifier",
            ),
            &["reason"],
        )?;

        let decode_errors = IntCounter::new(
            "md_feed_decode_errors_total",
            "Inbound frames that failed to decode",
        )?;

        let subscriptions_sent = IntCounter::new(
            "md_feed_subscriptions_sent_total",
            "Subscription requests sent",
        )?;

        let lifecycle_state = IntGauge::new(
            "md_feed_lifecycle_state",
            "Session lifecycle state (0=idle .. 6=closed, -1=errored)",
        )?;

        registry.register(Box::new(frames_dispatched.clone()))?;
        registry.register(Box::new(frames_discarded.clone()))?;
        registry.register(Box::new(decode_errors.clone()))?;
        registry.register(Box::new(subscriptions_sent.clone()))?;
        registry.register(Box::new(lifecycle_state.clone()))?;

        Ok(Self {
            registry,
            frames_dispatched,
            frames_discarded,
            decode_errors,
            subscriptions_sent,
            lifecycle_state,
        })
    }

    pub fn record_dispatch(&self, category: FrameCategory) {
        self.frames_dispatched
            .with_label_values(&[category.as_str()])
            .inc();
    }

    pub fn record_discard(&self, reason: &str) {
        self.frames_discarded.with_label_values(&[reason]).inc();
    }

    pub fn record_state(&self, state: SessionState) {
        self.lifecycle_state.set(state.code());
    }

    pub fn dispatched(&self, category: FrameCategory) -> u64 {
        self.frames_dispatched
            .with_label_values(&[category.as_str()])
            .get()
    }

    pub fn discarded(&self, reason: &str) -> u64 {
        self.frames_discarded.with_label_values(&[reason]).get()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
