use anyhow::Context as _;

/// This crate logs at `info`; dependencies only surface warnings unless
/// `RUST_LOG` asks for more.
const DEFAULT_FILTER: &str = "warn,beopsuny=info";

/// Diagnostics go to stderr so command output on stdout stays pipeable.
pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
