//! pipecache CLI entry point

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use pipecache::errors::EXIT_CLI;
use pipecache::tracing::init_tracing;

#[tokio::main]
async fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing infrastructure
    // may be corrupted during a panic, so we use the most reliable output method.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = pipecache::cli::parse();

    if let Err(error) = init_tracing(cli.tracing_config()) {
        eprintln!("{error:?}");
        std::process::exit(EXIT_CLI);
    }

    match pipecache::run(cli).await {
        Ok(output) => {
            if !output.stdout.is_empty() {
                println!("{}", output.stdout);
            }
            std::process::exit(output.exit_code);
        }
        Err(error) => {
            let code = error.exit_code();
            eprintln!("{:?}", miette::Report::new(error));
            std::process::exit(code);
        }
    }
}
