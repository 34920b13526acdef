//! ---
//! radar_section: "04-ingest-runtime"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Handler seam invoked once per parsed datagram."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
use anyhow::Result;
use radar_metrics::prometheus::Registry;
use radar_metrics::TelemetryMetrics;
use radar_msg::{Frame, HealthStatus, ParsedMessage, Track};
use tracing::info;

/// Consumer of successfully parsed datagrams.
///
/// Invoked synchronously inside the datagram's task; a panic aborts only that
/// datagram.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, message: ParsedMessage);
}

impl<F> MessageHandler for F
where
    F: Fn(ParsedMessage) + Send + Sync + 'static,
{
    fn handle(&self, message: ParsedMessage) {
        self(message)
    }
}

/// Default handler: structured log lines plus handler-side gauges and counters.
#[derive(Clone, Debug)]
pub struct TelemetryHandler {
    metrics: TelemetryMetrics,
}

impl TelemetryHandler {
    pub fn new(metrics: TelemetryMetrics) -> Self {
        Self { metrics }
    }

    pub fn register(registry: &Registry) -> Result<Self> {
        Ok(Self::new(TelemetryMetrics::register(registry)?))
    }

    pub fn metrics(&self) -> &TelemetryMetrics {
        &self.metrics
    }

    fn on_track(&self, track: &Track) {
        info!(
            id = track.id(),
            "Track id={} range={:.1} az={:.1} el={:.1} vr={:.1} snr={:.1}",
            track.id(),
            track.range_m(),
            track.az_deg(),
            track.el_deg(),
            track.vr_mps(),
            track.snr_db()
        );
    }

    fn on_health(&self, health: &HealthStatus) {
        self.metrics
            .set_health(health.temperature_c(), health.cpu_load_pct());
        info!(
            mode = %health.radar_mode(),
            "Health mode={} temp={:.1}C cpu={:.1}%",
            health.radar_mode(),
            health.temperature_c(),
            health.cpu_load_pct()
        );
    }

    fn on_frame(&self, frame: &Frame) {
        info!(tracks = frame.len(), "Frame received: {} tracks", frame.len());
    }
}

impl MessageHandler for TelemetryHandler {
    fn handle(&self, message: ParsedMessage) {
        match &message {
            ParsedMessage::Track(track) => self.on_track(track),
            ParsedMessage::Health(health) => self.on_health(health),
            ParsedMessage::Frame(frame) => self.on_frame(frame),
        }
        self.metrics.record_packet(message.kind().as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use radar_msg::RadarMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn track(id: u64) -> Track {
        Track::new(Utc::now(), id, 1200.0, 12.5, 3.0, -4.0, 22.0).expect("valid track")
    }

    #[test]
    fn closures_are_handlers() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handler: Box<dyn MessageHandler> = Box::new(move |_message: ParsedMessage| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handler.handle(ParsedMessage::Track(track(1)));
        handler.handle(ParsedMessage::Track(track(2)));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn health_updates_gauges_and_counts() {
        let registry = Registry::new();
        let handler = TelemetryHandler::register(&registry).expect("register");
        let health = HealthStatus::new(Utc::now(), RadarMode::Operational, 47.25, 12.1, 33.0)
            .expect("valid health");
        handler.handle(ParsedMessage::Health(health));

        assert_eq!(handler.metrics().temperature_c(), 47.25);
        assert_eq!(handler.metrics().cpu_pct(), 33.0);
        assert_eq!(handler.metrics().packets("health"), 1);
        assert_eq!(handler.metrics().packets("track"), 0);
    }

    #[test]
    fn tracks_and_frames_count_by_kind() {
        let registry = Registry::new();
        let handler = TelemetryHandler::register(&registry).expect("register");
        handler.handle(ParsedMessage::Track(track(7)));
        handler.handle(ParsedMessage::Frame(Frame::from_tracks(vec![track(8), track(9)])));
        handler.handle(ParsedMessage::Frame(Frame::from_tracks(Vec::new())));

        assert_eq!(handler.metrics().packets("track"), 1);
        assert_eq!(handler.metrics().packets("frame"), 2);
        assert_eq!(handler.metrics().temperature_c(), 0.0);
    }
}
