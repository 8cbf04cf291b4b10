use clap::Parser;
use gexflow::cli::{Cli, Commands};
use gexflow::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An invalid configuration must prevent startup; the error names the
    // offending field and value.
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run(args) => {
            gexflow::telemetry::init_telemetry(&config.telemetry)?;
            tracing::info!(config = %cli.config, "Starting signal pipeline");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Validation: cooldown {}s, session {}-{} {}",
                config.validation.cooldown_secs,
                config.validation.market_open,
                config.validation.market_close,
                config.validation.market_timezone
            );
            println!(
                "  Risk: volatility caution {} / ceiling {}, max positions {}",
                config.risk.caution_volatility,
                config.risk.max_volatility,
                config.risk.max_open_positions
            );
            println!(
                "  Sizing: base {} x kelly {} in [{}, {}]",
                config.sizing.base_size,
                config.sizing.kelly_fraction,
                config.sizing.min_size,
                config.sizing.max_size
            );
            println!(
                "  Confidence: base {}, minimum {}",
                config.confidence.base_confidence, config.confidence.min_confidence
            );
        }
        Commands::Status => {
            println!("gexflow status");
            println!("  Mode: paper trading");
            println!("  Status: not running");
        }
    }

    Ok(())
}
