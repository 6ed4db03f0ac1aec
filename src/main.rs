//! Edge Router
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌────────────────────────────────────────────────────┐
//!                          │                    EDGE ROUTER                     │
//!                          │                                                    │
//!   Client Request         │  ┌─────────┐   ┌─────────┐   ┌──────────────┐      │
//!   ───────────────────────┼─▶│   net   │──▶│  http   │──▶│   binding    │      │
//!                          │  │listener │   │ server  │   │ 421 / 308    │      │
//!                          │  │  + tls  │   └─────────┘   └──────┬───────┘      │
//!                          │  └─────────┘                        ▼              │
//!                          │                              ┌──────────────┐      │
//!                          │                              │   routing    │      │
//!                          │                              │longest prefix│      │
//!                          │                              └──┬────────┬──┘      │
//!                          │                                 ▼        ▼         │
//!                          │                      ┌────────────┐  ┌──────────┐  │
//!   Client Response        │                      │static_files│  │  proxy   │──┼──▶ Upstream
//!   ◀──────────────────────┼──────────────────────│range/cache │  │ upstream │◀─┼─── (webapp)
//!                          │                      └─────┬──────┘  └──────────┘  │
//!                          │                            ▼                       │
//!                          │                       asset roots                  │
//!                          │                                                    │
//!                          │  Cross-cutting: config snapshots, health, limits,  │
//!                          │  timeouts, logging, metrics, lifecycle, admin      │
//!                          └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use edge_router::lifecycle::startup;

#[derive(Parser)]
#[command(name = "edge-router")]
#[command(about = "Edge router for the video upload and conversion service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration (certificates included) and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.check {
        let snapshot = startup::check(args.config.as_deref()).await?;
        println!(
            "configuration OK: {} routes, {} upstreams, binding {}",
            snapshot.routes.len(),
            snapshot.upstreams.len(),
            snapshot.binding.state()
        );
        return Ok(());
    }

    startup::run(args.config).await
}
