use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

/// Request-level instruments. Without a configured meter provider these are
/// no-ops.
#[derive(Clone)]
pub struct PredictMetrics {
    requests: Counter<u64>,
    detections: Counter<u64>,
    duration: Histogram<f64>,
}

impl PredictMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0, 10.0,
        ];

        let requests = meter
            .u64_counter("predict_requests_total")
            .with_description("Prediction requests by outcome")
            .build();
        let detections = meter
            .u64_counter("predict_detections_total")
            .with_description("Detections returned to clients")
            .build();
        let duration = meter
            .f64_histogram("predict_duration_seconds")
            .with_description("End-to-end time to serve a prediction request")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build();

        Self {
            requests,
            detections,
            duration,
        }
    }

    pub fn record(&self, outcome: &'static str, detections: usize, elapsed_secs: f64) {
        let attributes = [KeyValue::new("outcome", outcome)];
        self.requests.add(1, &attributes);
        self.duration.record(elapsed_secs, &attributes);
        if detections > 0 {
            self.detections.add(detections as u64, &[]);
        }
    }
}

impl Default for PredictMetrics {
    fn default() -> Self {
        Self::new("gateway")
    }
}
