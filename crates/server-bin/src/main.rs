//! Quill server binary.
//!
//! Listens for editor connections over TCP and coordinates real-time
//! collaborative editing sessions.

use std::net::SocketAddr;

use clap::Parser;
use quill_server::Server;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Server command line arguments.
#[derive(Parser, Debug)]
#[command(name = "quill-server")]
#[command(about = "Real-time collaborative plain-text editing server")]
struct Args {
	/// Address to listen on
	#[arg(short, long, default_value_t = default_addr())]
	addr: SocketAddr,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

fn default_addr() -> SocketAddr {
	SocketAddr::from(([127, 0, 0, 1], quill_proto::DEFAULT_TCP_PORT))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	tracing_subscriber::fmt()
		.with_max_level(if args.verbose {
			tracing::Level::DEBUG
		} else {
			tracing::Level::INFO
		})
		.init();

	info!("starting quill-server");

	let server = Server::bind(args.addr).await?;
	let shutdown = CancellationToken::new();

	let interrupt = shutdown.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!("interrupt received");
			interrupt.cancel();
		}
	});

	server.run(shutdown).await?;
	Ok(())
}
