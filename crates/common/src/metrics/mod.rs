//! Metrics and observability utilities
//!
//! Provides Prometheus metric descriptions and recording helpers for the
//! ranking pipeline, with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all FollowRank metrics
pub const METRICS_PREFIX: &str = "followrank";

/// Buckets for ranking run duration (in seconds)
pub const RUN_DURATION_BUCKETS: &[f64] = &[
    0.1,    // 100ms
    0.5,    // 500ms
    1.0,    // 1s
    5.0,    // 5s
    15.0,   // 15s
    30.0,   // 30s
    60.0,   // 1m
    300.0,  // 5m
    900.0,  // 15m
    1800.0, // 30m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Run metrics
    describe_counter!(
        format!("{}_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total ranking runs by outcome"
    );

    describe_histogram!(
        format!("{}_run_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Ranking run latency in seconds"
    );

    describe_gauge!(
        format!("{}_graph_nodes", METRICS_PREFIX),
        Unit::Count,
        "Nodes in the most recently ranked graph"
    );

    describe_gauge!(
        format!("{}_graph_edges", METRICS_PREFIX),
        Unit::Count,
        "Edges in the most recently ranked graph"
    );

    // Solver metrics
    describe_gauge!(
        format!("{}_solver_iterations", METRICS_PREFIX),
        Unit::Count,
        "Power iterations used by the last solve"
    );

    describe_gauge!(
        format!("{}_solver_residual", METRICS_PREFIX),
        Unit::Count,
        "Final L1 delta between successive iterates"
    );

    describe_counter!(
        format!("{}_solver_budget_exhausted_total", METRICS_PREFIX),
        Unit::Count,
        "Solves that hit the iteration budget before converging"
    );

    // Recovered conditions
    describe_counter!(
        format!("{}_degenerate_distribution_total", METRICS_PREFIX),
        Unit::Count,
        "Zero-range distributions replaced by a fallback"
    );

    describe_counter!(
        format!("{}_estimation_fallback_total", METRICS_PREFIX),
        Unit::Count,
        "Percentile estimates answered with the neutral default"
    );

    describe_counter!(
        format!("{}_anchor_tables_published_total", METRICS_PREFIX),
        Unit::Count,
        "Anchor tables swapped in for readers"
    );

    describe_gauge!(
        format!("{}_anchor_table_size", METRICS_PREFIX),
        Unit::Count,
        "Anchors in the published table"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record a finished ranking run
pub fn record_run(duration_secs: f64, nodes: usize, edges: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_runs_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(format!("{}_run_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    if success {
        gauge!(format!("{}_graph_nodes", METRICS_PREFIX)).set(nodes as f64);
        gauge!(format!("{}_graph_edges", METRICS_PREFIX)).set(edges as f64);
    }
}

/// Helper to record solver convergence
pub fn record_solve(iterations: usize, residual: f64, converged: bool) {
    gauge!(format!("{}_solver_iterations", METRICS_PREFIX)).set(iterations as f64);
    gauge!(format!("{}_solver_residual", METRICS_PREFIX)).set(residual);

    if !converged {
        counter!(format!("{}_solver_budget_exhausted_total", METRICS_PREFIX)).increment(1);
    }
}

/// Helper to record a degenerate distribution fallback
pub fn record_degenerate(what: &str) {
    counter!(
        format!("{}_degenerate_distribution_total", METRICS_PREFIX),
        "vector" => what.to_string()
    )
    .increment(1);
}

/// Helper to record a neutral-default percentile estimate
pub fn record_estimation_fallback(reason: &str) {
    counter!(
        format!("{}_estimation_fallback_total", METRICS_PREFIX),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Helper to record an anchor table swap
pub fn record_anchor_publish(anchor_count: usize) {
    counter!(format!("{}_anchor_tables_published_total", METRICS_PREFIX)).increment(1);

    gauge!(format!("{}_anchor_table_size", METRICS_PREFIX)).set(anchor_count as f64);
}
