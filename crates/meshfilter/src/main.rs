use anyhow::Context;
use clap::Parser;
use tracing::info;

use meshfilter::{Cli, MqttBus, Relay};

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if debug {
        EnvFilter::new("meshfilter=debug,meshfilter_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = cli.load_config().context("invalid configuration")?;
    let relay = Relay::from_config(&config).context("failed to start relay")?;
    info!(
        broker = %config.broker.host,
        port = config.broker.port,
        input = %config.topics.input,
        output = %config.topics.output,
        keys = relay.pipeline().keys().len(),
        "starting meshfilter"
    );

    let bus = MqttBus::connect(&config.broker);
    let result = relay.run(&bus).await;
    bus.disconnect().await;

    let totals = result?;
    info!(total = totals.total, forwarded = totals.forwarded, "stopped");
    Ok(())
}
