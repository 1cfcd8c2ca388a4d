//! Generation metrics, registered in the default Prometheus registry.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

lazy_static! {
    pub static ref DOCUMENTS_GENERATED: IntCounterVec = register_int_counter_vec!(
        "mailmerge_documents_generated_total",
        "Documents generated successfully, by run mode",
        &["mode"]
    )
    .unwrap();
    pub static ref PAIR_FAILURES: IntCounterVec = register_int_counter_vec!(
        "mailmerge_pair_failures_total",
        "Template/record pairs that failed, by error category",
        &["kind"]
    )
    .unwrap();
    pub static ref RUNS: IntCounterVec = register_int_counter_vec!(
        "mailmerge_runs_total",
        "Generation runs, by mode and outcome",
        &["mode", "outcome"]
    )
    .unwrap();
    pub static ref CONVERSION_SECONDS: Histogram = register_histogram!(
        "mailmerge_conversion_seconds",
        "Wall time of successful document conversions",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]
    )
    .unwrap();
}

/// Render the default registry in the text exposition format.
pub fn gather_text() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}
