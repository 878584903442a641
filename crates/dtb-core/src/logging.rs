use crate::Result;

/// Initialize logging/tracing for the bot.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(service_name)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("failed to install tracing subscriber: {e}")))
}

/// Directive used when `RUST_LOG` is unset: info everywhere.
fn default_filter(service_name: &str) -> String {
    format!("info,dtb=info,dtb_core=info,dtb_discord=info,dtb_providers=info,{service_name}=info")
}
