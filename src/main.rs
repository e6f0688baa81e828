use clap::Parser;
use colored::Colorize;

use a3s_bootstrap::build::{output_tail, OUTPUT_TAIL_LINES};
use a3s_bootstrap::{exit_code, Bootstrap, BootstrapConfig, BootstrapError, SystemRunner};

#[derive(Parser)]
#[command(
    name = "a3s-bootstrap",
    version,
    about = "Install the toolchain and native libraries, then build and install wp-spotlight"
)]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _cli = Cli::parse();

    let config = BootstrapConfig::load();
    let log_level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "warn".into());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .without_time()
        .init();

    let result = match config {
        Ok(config) => run(config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        report(e);
    }
    let code = exit_code(&result);
    if code != 0 {
        std::process::exit(code);
    }
}

async fn run(config: BootstrapConfig) -> a3s_bootstrap::Result<()> {
    let runner = SystemRunner::new();
    let installed = Bootstrap::new(config, &runner).run().await?;
    tracing::info!(
        "done on {}: {} install actions, binary at {}",
        installed.host,
        installed.report.results.len(),
        installed.build.installed.display()
    );
    Ok(())
}

fn report(e: &BootstrapError) {
    eprintln!("{} [{}] {e}", "[a3s-bootstrap]".red().bold(), e.phase());
    match e {
        BootstrapError::ActionFailed { output, .. } if !output.trim().is_empty() => {
            eprintln!("{}", output_tail(output, OUTPUT_TAIL_LINES).dimmed());
        }
        BootstrapError::Unsupported(_) => {
            eprintln!(
                "  {} nothing was installed; follow the message above to continue by hand",
                "·".dimmed()
            );
        }
        _ => {}
    }
}
