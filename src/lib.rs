pub mod config;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use pipeline::chat::ChatSession;
pub use pipeline::remarks::{
    CancellationToken, RemarkError, RemarkPipeline, RemarkProgress, RemarkRequest, SourceConfig,
    TargetConfig,
};

/// Install the global `fmt` subscriber. `RUST_LOG` wins over the default
/// filter. Calling it again (or after the host installed its own
/// subscriber) is a no-op.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{} logging initialized", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_tracing_is_idempotent() {
        super::init_tracing();
        super::init_tracing();
    }
}
