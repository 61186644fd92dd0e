use clap::Parser;
use icue_ingest::cli::{self, Args};
use std::process;
use tokio_util::sync::CancellationToken;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    if let Err(error) = cli::setup_logging(&args) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }

    // Create async runtime and run the selected mode with signal handling
    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        // Create cancellation token for coordinating graceful shutdown
        let cancellation_token = CancellationToken::new();

        let signal_token = cancellation_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nReceived CTRL+C, shutting down gracefully...");
                signal_token.cancel();
            }
        });

        cli::run(args, cancellation_token).await
    });

    match result {
        Ok(()) => process::exit(0),
        Err(error) => {
            tracing::error!("{:#}", error);
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
