use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "pockets_frontend=info,reqwest=warn";

/// `POCKETS_LOG` wins over `RUST_LOG`; unparsable directives fall back to the
/// crate default.
fn log_filter(pockets_log: Option<String>, rust_log: Option<String>) -> EnvFilter {
    pockets_log
        .or(rust_log)
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Installs the global fmt subscriber. Returns false when the host already
/// installed one.
pub fn init_tracing() -> bool {
    let filter = log_filter(
        std::env::var("POCKETS_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
