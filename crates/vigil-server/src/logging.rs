use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` is honoured and the `vigil`
/// targets log at `level`.
pub fn init(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(format!("vigil={level}").parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
