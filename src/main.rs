use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::error;

use docprobe::{
    config::{ConfigOverrides, ProbeConfig},
    smoke::{failure_message, FAILURE_EXIT_CODE},
    ConnectivitySmokeTest, Connector, SmokeTestReport,
};

#[derive(Parser, Debug)]
#[command(name = "docprobe", about = "Smoke-test Firestore connectivity and credentials")]
struct Cli {
    /// Collection to write the probe document into
    #[arg(long, short = 'c')]
    collection: Option<String>,

    /// Delete the probe document after reading it back
    #[arg(long)]
    cleanup: bool,

    /// Keep the probe document even when DOCPROBE_CLEANUP is set
    #[arg(long, conflicts_with = "cleanup")]
    no_cleanup: bool,

    /// Service account key file
    #[arg(long, value_name = "PATH")]
    key_file: Option<PathBuf>,

    /// Project ID override
    #[arg(long)]
    project: Option<String>,

    /// Emulator address used when no credentials are found
    #[arg(long, value_name = "HOST:PORT")]
    emulator_host: Option<String>,
}

impl From<Cli> for ConfigOverrides {
    fn from(cli: Cli) -> Self {
        ConfigOverrides {
            collection_name: cli.collection,
            // Neither flag keeps DOCPROBE_CLEANUP
            perform_cleanup: match (cli.cleanup, cli.no_cleanup) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            key_file: cli.key_file,
            project_id: cli.project,
            emulator_host: cli.emulator_host,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,docprobe=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    println!("🚀 Starting Firestore Test Script");
    println!("{}", "=".repeat(50));

    match run(cli).await {
        Ok(report) => {
            println!();
            report.print_summary();
            println!();
            println!("🎉 Firestore test completed successfully!");
            Ok(())
        }
        Err(e) => {
            error!("Smoke test aborted: {:#}", e);
            println!("{}", failure_message(&e));
            std::process::exit(FAILURE_EXIT_CODE);
        }
    }
}

async fn run(cli: Cli) -> Result<SmokeTestReport> {
    let mut config = ProbeConfig::from_env()?;
    config.apply_overrides(cli.into());

    let options = config.smoke_options()?;
    let connector = Connector::new(config);
    let smoke_test = ConnectivitySmokeTest::new(options);

    Ok(smoke_test.execute(&connector).await?)
}
