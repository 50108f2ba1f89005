//! `host` command: accept scene connections over WebSocket and run the
//! editor side of the bridge.
//!
//! One scene at a time. When it disconnects the next connection reuses the
//! same session, so history and the error overlay survive a page reload.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::bridge::{Bridge, Role};
use crate::channel::WsChannel;
use crate::config::SceneConfig;
use crate::core::{arm_shutdown, is_shutdown, set_connected, wait_for_shutdown};
use crate::logger::{status_detach, status_error, status_success, status_warning};
use crate::session::{HostSession, MemoryPersistence};
use crate::{debug, log};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Accept loop sleep while no scene is connecting.
const ACCEPT_IDLE: Duration = Duration::from_millis(50);

/// Bind to the specified interface and port, with automatic port retry.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(TcpListener, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match TcpListener::bind(addr) {
            Ok(listener) => {
                if offset > 0 {
                    log!("host"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((listener, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string())
    ))
}

/// Run the host until Ctrl+C.
pub fn run_host(config: &SceneConfig) -> Result<()> {
    let (listener, addr) = bind_with_retry(config.host.interface, config.host.port)?;
    listener
        .set_nonblocking(true)
        .context("failed to make listener non-blocking")?;
    arm_shutdown();
    log!("host"; "waiting for a scene on ws://{}", addr);
    status_detach();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let mut session: Option<HostSession> = None;
    while let Some(stream) = next_connection(&listener)? {
        let channel = match open_channel(stream) {
            Ok(channel) => channel,
            Err(e) => {
                status_warning(&format!("handshake failed: {e:#}"));
                continue;
            }
        };
        let peer = channel
            .peer()
            .map_or_else(|| "unknown peer".to_string(), |p| p.to_string());

        let bridge = match &session {
            Some(session) => {
                session.bridge().reconnect(channel);
                session.on_reconnect();
                session.bridge().clone()
            }
            None => {
                let bridge = Bridge::with_gate(Role::Host, channel, config.bridge.gated);
                session = Some(HostSession::new(bridge.clone(), MemoryPersistence::new()));
                bridge
            }
        };

        set_connected(true);
        status_success(&format!("scene connected from {peer}"));

        let outcome = rt.block_on(async {
            tokio::select! {
                result = bridge.run(config.bridge.poll_interval()) => result,
                () = wait_for_shutdown() => Ok(()),
            }
        });
        set_connected(false);

        if is_shutdown() {
            break;
        }
        match outcome {
            Ok(()) => status_warning(&format!("scene {peer} disconnected")),
            Err(e) => status_error("bridge stopped", &e.to_string()),
        }
    }

    if let Some(session) = &session {
        debug!("host"; "{} undoable edit(s) at exit", session.history_labels().len());
    }
    Ok(())
}

/// Wait for the next TCP connection. `None` once shutdown was requested.
fn next_connection(listener: &TcpListener) -> Result<Option<TcpStream>> {
    loop {
        if is_shutdown() {
            return Ok(None);
        }
        match listener.accept() {
            Ok((stream, _)) => return Ok(Some(stream)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_IDLE),
            Err(e) => return Err(e).context("failed to accept connection"),
        }
    }
}

fn open_channel(stream: TcpStream) -> Result<WsChannel> {
    // The listener is non-blocking; the handshake needs a blocking socket
    stream.set_nonblocking(false)?;
    Ok(WsChannel::accept(stream)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bind_with_retry_skips_taken_port() {
        let (first, addr) = bind_with_retry(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).unwrap();
        let taken = first.local_addr().unwrap().port();
        assert_eq!(addr.port(), 0);

        let (_second, addr) = bind_with_retry(IpAddr::V4(Ipv4Addr::LOCALHOST), taken).unwrap();
        assert_ne!(addr.port(), taken);
    }
}
