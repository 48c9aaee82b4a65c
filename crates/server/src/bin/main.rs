use steward_server::StewardServer;

#[derive(clap::Parser)]
#[command(name = "steward", about = "Query workflow and execution safety server")]
struct Args {
    /// Application configuration file.
    #[arg(long, default_value = "config/steward.yaml")]
    config: String,

    /// Deployment file with targets and team approver assignments.
    #[arg(long, default_value = "config/targets.yaml")]
    targets: String,

    /// Enable OTLP trace export.
    #[arg(long)]
    observability: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = <Args as clap::Parser>::parse();

    StewardServer::new()
        .with_config(&args.config)
        .with_deployment(&args.targets)
        .with_observability(args.observability)
        .run()
        .await
}
