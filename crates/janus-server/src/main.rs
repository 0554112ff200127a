//! The bridge binary: ties the network service and the gateway together
//! under a 20 TPS tick loop with a minimal stdin console.

mod config;

use std::io::BufRead;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::Context;
use janus_net::NetworkService;
use janus_protocol::{GAME_VERSION, Gateway, LogBridge, PROTOCOL_VERSION};
use tracing::{info, warn};

use crate::config::Config;

const TICK: Duration = Duration::from_millis(50);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load("run/config.toml");
    let addr: SocketAddr = format!("{}:{}", config.address, config.port)
        .parse()
        .context("invalid bind address")?;

    let (main_link, net_link) = janus_link::link();
    let service = NetworkService::spawn(addr, net_link).context("binding the listener")?;
    let mut gateway = Gateway::new(main_link, LogBridge, config.gateway_settings());

    info!(
        "serving {GAME_VERSION} (protocol {PROTOCOL_VERSION}) on {}, motd {:?}",
        service.local_addr(),
        config.motd
    );

    let console = spawn_console();
    'run: loop {
        let start = Instant::now();
        gateway.tick();

        while let Ok(line) = console.try_recv() {
            match line.trim() {
                "" => {}
                "stop" => break 'run,
                line => {
                    if let Some(message) = line.strip_prefix("say ") {
                        gateway.broadcast_chat(message);
                    } else {
                        warn!("unknown command {line:?}");
                    }
                }
            }
        }

        if let Some(rest) = TICK.checked_sub(start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    gateway.shutdown();
    service.join();
    info!("stopped");
    Ok(())
}

/// Forwards stdin lines to the tick loop. The thread ends with stdin.
fn spawn_console() -> flume::Receiver<String> {
    let (tx, rx) = flume::unbounded();
    let spawned = std::thread::Builder::new()
        .name("janus-console".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("console unavailable: {e}");
    }
    rx
}
