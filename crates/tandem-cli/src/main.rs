// Copyright 2025 Tandem Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Tandem CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Serve the demo TestingService on a TCP port, also accepting HTTP clients
//! tandem serve -b 127.0.0.1:9090 --http
//!
//! # Serve it on a local socket
//! tandem serve -p /tmp/tandem.sock
//!
//! # Call it
//! tandem call 127.0.0.1:9090 invert true -H trace=abc
//! tandem call unix:/tmp/tandem.sock get-name -t framed -P binary
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use argh::FromArgs;

use tandem_client::{get_client, ClientConfig, RpcOptions};
use tandem_common::transport::{ClientType, Protocol};
use tandem_common::Address;
use tandem_server::{Server, ServerConfig};
use tandem_services::{TestingServiceClient, TestingServiceProcessor};

use tandem_cli::{parse_header, DemoHandler};

#[derive(FromArgs)]
/// Tandem - async RPC with pluggable framing, codecs and per-call headers
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Call(CallArgs),
}

// At most one of `--bind` and `--path`; with neither the server binds
// `127.0.0.1:0` and logs the port it got.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// serve the demo TestingService
struct ServeArgs {
    /// tcp address to bind, e.g. 127.0.0.1:9090 (port 0 picks a free port)
    #[argh(option, short = 'b')]
    bind: Option<String>,

    /// local socket path to listen on instead of a TCP port
    #[argh(option, short = 'p')]
    path: Option<PathBuf>,

    /// also accept HTTP clients on the same endpoint
    #[argh(switch)]
    http: bool,

    /// name reported by get_name
    #[argh(option, default = "\"tandem\".into()")]
    name: String,
}

// Prints the result, then one `key: value` line per reply header sorted by key.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call invert or get-name on a TestingService
struct CallArgs {
    /// server address: host:port or unix:/path/to/socket
    #[argh(positional)]
    address: Address,

    /// method to call: invert or get-name
    #[argh(positional)]
    method: String,

    /// argument for invert (true or false)
    #[argh(positional)]
    value: Option<bool>,

    /// transport: unframed, framed, framed-compact (default) or http
    #[argh(option, short = 't', default = "ClientType::default()")]
    client_type: ClientType,

    /// serialization protocol: binary or compact; defaults to the transport's own
    #[argh(option, short = 'P')]
    protocol: Option<Protocol>,

    /// request header as key=value; may be repeated
    #[argh(option, short = 'H', long = "header")]
    headers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // call keeps stdout clean for piping, so it gets no subscriber
    if !matches!(cli.command, Commands::Call(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Call(args) => run_call(args).await,
    }
}

fn serve_address(args: &ServeArgs) -> Result<Address> {
    match (&args.bind, &args.path) {
        (Some(_), Some(_)) => Err(anyhow::anyhow!("--bind and --path are mutually exclusive")),
        (Some(bind), None) => Ok(bind.parse()?),
        (None, Some(path)) => Ok(Address::Local(path.clone())),
        (None, None) => Ok(Address::tcp("127.0.0.1", 0)),
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let address = serve_address(&args)?;
    let handler = DemoHandler::new(args.name.clone());
    let config = ServerConfig::default().with_http(args.http);
    let server = Arc::new(Server::with_config(
        TestingServiceProcessor::new(handler.clone()),
        address,
        config,
    ));

    let runner = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.serve().await })
    };

    if server.get_address().await.is_err() {
        // serve() gave up before binding; its error says why
        runner.await??;
        anyhow::bail!("Server stopped before it started listening");
    }
    if args.http {
        tracing::info!("HTTP clients accepted");
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, stopping"),
        _ = handler.shutdown_requested() => tracing::info!("Stopping on client request"),
    }

    server.stop().await;
    runner.await??;
    Ok(())
}

/// Makes one call and prints the result.
///
/// No tracing is initialized for this command so the output can be piped.
async fn run_call(args: CallArgs) -> Result<()> {
    let mut config = ClientConfig::new(args.address).with_client_type(args.client_type);
    if let Some(protocol) = args.protocol {
        config = config.with_protocol(protocol);
    }

    let mut options = RpcOptions::new();
    for header in &args.headers {
        let (key, value) = parse_header(header)?;
        options.set_header(key, value);
    }

    let client: TestingServiceClient = get_client(config);
    let result = match args.method.as_str() {
        "invert" => {
            let value = args
                .value
                .ok_or_else(|| anyhow::anyhow!("invert needs a value: true or false"))?;
            client.invert_with(value, &mut options).await.map(|v| v.to_string())
        }
        "get-name" | "get_name" => client.get_name_with(&mut options).await,
        other => {
            client.close().await;
            anyhow::bail!("Unknown method '{}': expected invert or get-name", other);
        }
    };
    client.close().await;

    println!("{}", result?);
    let mut headers: Vec<_> = options.read_headers().iter().collect();
    headers.sort();
    for (key, value) in headers {
        println!("{}: {}", key, value);
    }

    Ok(())
}
