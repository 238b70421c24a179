//! stacktester: runs a conformance instruction stream against the in-memory
//! store.
//!
//! Usage: `stacktester <prefix> <api_version> [cluster] [--config <path>]`
//!
//! - **prefix**: key prefix of the root instruction stream
//! - **api_version**: rejected when newer than the interpreter supports
//! - **cluster**: snapshot file seeding the keyspace, rewritten after the run
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

mod commands;
mod run;
mod settings;

use std::process;

use tracing_subscriber::EnvFilter;

use commands::{build_cli, Invocation};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    let invocation = match Invocation::from_matches(&matches) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("(error) {:#}", e);
            process::exit(2);
        }
    };

    match run::run(&invocation).await {
        Ok(summary) if summary.is_success() => {}
        Ok(summary) => {
            for failure in &summary.failures {
                eprintln!("(error) context {}: {}", failure.context, failure.error);
            }
            process::exit(1);
        }
        Err(e) => {
            eprintln!("(error) {:#}", e);
            process::exit(1);
        }
    }
}
