/// Install the tracing subscriber for the CLI. Filtering defaults to
/// `ledgerlift=info,sqlx=warn` and can be overridden with `LEDGERLIFT_LOG`.
pub fn init_logging() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("LEDGERLIFT_LOG").unwrap_or_else(|_| "ledgerlift=info,sqlx=warn".into()),
        )
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}
