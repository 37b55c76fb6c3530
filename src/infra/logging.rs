pub fn init() {
    // Initialize tracing subscriber once, honoring RUST_LOG if set (default
    // info). Logs go to stderr: in stdio mode stdout carries protocol frames.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log a metrics-like line for per-tool numbers the counters don't cover.
pub fn log_metric(tool: &str, metric: &str, value: f64) {
    tracing::info!(tool = tool, metric = metric, value = value, "metric");
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        super::init();
        super::init();
        super::log_metric("tweet", "upstream_latency_ms", 1.0);
    }
}
