use std::sync::{Arc, atomic::AtomicBool};

use clap::Parser;
use ember_server::{Config, Server};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::info;

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))?;
    }

    let mut server = Server::bind(&cfg)?;
    server.run(&shutdown);
    info!("shut down");
    Ok(())
}
