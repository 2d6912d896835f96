//utils for graceful shutdown shared by the server, drainer and simulator
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Token that fires on ctrl-c. Clone it into every task that should stop.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let tc = token.clone();
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl+C handler");
        tc.cancel();
    });
    token
}
