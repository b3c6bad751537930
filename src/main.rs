use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use credbridge_lib::commands::serve;
use credbridge_lib::config::HostConfig;
use credbridge_lib::production::StdoutSink;
use credbridge_lib::{init_logging, AppState, CommandRequest};

const REQUEST_QUEUE_DEPTH: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = HostConfig::from_env()?;
    let _guard = init_logging(config.log_dir.as_deref())?;

    tracing::info!("Credbridge starting up");
    let state = AppState::new_production(&config)?;

    let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
    let server = tokio::spawn(serve(
        state.bridge.clone(),
        rx,
        Arc::new(StdoutSink::stdout()),
    ));

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut line = Vec::new();
    loop {
        line.clear();
        match stdin.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                // Queued requests are still answered below
                tracing::error!(error = %e, "Failed to read from stdin");
                break;
            }
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        if tx.send(CommandRequest::from_bytes(&line)).await.is_err() {
            tracing::error!("Request loop stopped unexpectedly");
            break;
        }
    }
    drop(tx);

    let served = server.await?;
    tracing::info!(served, "Credbridge shutting down");
    Ok(())
}
