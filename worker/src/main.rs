use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let default_level = "info";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .try_init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(judge_worker::run_main())
}
