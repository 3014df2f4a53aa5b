//! Offline-resilience control client.
//!
//! Sends one command to a running control server and prints the reply.

use bytes::BytesMut;
use clap::Parser;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use offline_resilience::cli::{Cli, ClientCommand};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let addr = args.endpoint.addr();
    let mut stream = match TcpStream::connect(&addr).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to connect to server at {}: {}", addr, e);
            eprintln!("Make sure the server is running with: cargo run --bin server");
            std::process::exit(1);
        }
    };

    let request = args.command.to_request();
    stream.write_all(request.encode().as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = BytesMut::with_capacity(4096);
    while stream.read_buf(&mut buf).await? > 0 {}

    let response = match std::str::from_utf8(&buf) {
        Ok(resp) => resp,
        Err(e) => {
            eprintln!("Failed to parse response: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(err) = response.strip_prefix("ERR ") {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    match (&args.command, response) {
        (ClientCommand::Get { key }, "") => println!("Key '{}' not found", key),
        (ClientCommand::Set { key, .. }, "r Ok") => println!("Updated key '{}'", key),
        (ClientCommand::Set { key, .. }, "Ok") => println!("Set key '{}'", key),
        (ClientCommand::ClearKey { key }, "Ok") => println!("Cleared key '{}'", key),
        (ClientCommand::ClearKey { key }, "") => println!("Key '{}' not found", key),
        (ClientCommand::ClearAll, _) => println!("All cache cleared"),
        (ClientCommand::Enqueue { action, .. }, id) => println!("Queued '{}' as {}", action, id),
        (ClientCommand::Stats, resp) => {
            println!("Statistics:");
            for part in resp.split_whitespace() {
                if let Some((key, value)) = part.split_once(':') {
                    println!("  {}: {}", key, value);
                }
            }
        }
        (ClientCommand::Queue | ClientCommand::Sync | ClientCommand::Metrics, resp) => {
            match serde_json::from_str::<serde_json::Value>(resp) {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                Err(_) => println!("{}", resp),
            }
        }
        (_, resp) => println!("{}", resp),
    }

    Ok(())
}
