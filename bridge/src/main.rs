use std::io::{self, Read, Write};

use dydx_bridge::exchange::dydx::DydxExchange;
use dydx_bridge::handlers;
use dydx_bridge::protocol::BridgeResponse;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_crypto_provider() {
    // Rustls 0.23 requires a process-wide crypto provider; opt into ring
    // before any TLS handshake. A second install attempt is harmless.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

#[tokio::main]
async fn main() {
    init_crypto_provider();

    // Diagnostics go to stderr so stdout carries nothing but the one result.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive("dydx_bridge=info".parse().unwrap()))
        .init();

    let mut raw = String::new();
    let response = match io::stdin().read_to_string(&mut raw) {
        Ok(_) => run(&raw).await,
        Err(err) => BridgeResponse::failure(format!("failed to read stdin: {err}")),
    };

    let json = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"success":false,"error":"failed to encode result"}"#.to_string());
    let mut stdout = io::stdout().lock();
    if writeln!(stdout, "{json}").and_then(|_| stdout.flush()).is_err() {
        std::process::exit(1);
    }

    std::process::exit(response.exit_code());
}

async fn run(raw: &str) -> BridgeResponse {
    let prepared = match handlers::preflight(raw) {
        Ok(prepared) => prepared,
        Err(response) => return response,
    };

    tracing::info!(command = %prepared.command, network = %prepared.profile.network, "dispatching");

    let mut exchange = match DydxExchange::connect(prepared.profile.clone(), &prepared.mnemonic).await
    {
        Ok(exchange) => exchange,
        Err(err) => {
            tracing::error!("connect failed: {err:#}");
            return BridgeResponse::failure(dydx_bridge::BridgeError::Exchange(err).to_string());
        }
    };

    handlers::dispatch(&prepared.command, &prepared.data, &mut exchange).await
}
