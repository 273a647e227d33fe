//! WebSocket endpoint for live updates.
//!
//! Accepted connections are handed to the [`Hub`], which sends them the
//! current snapshot. A reaper thread drops clients that went away.

use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use super::hub::Hub;
use crate::core::is_shutdown;
use crate::{debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Accept and reaper poll interval.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bounds a send to a stalled browser.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounds a peer that connects but never sends the handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Start accepting WebSocket clients, returning the bound port.
pub fn start(interface: IpAddr, base_port: u16, hub: Arc<Hub>) -> Result<u16> {
    let (listener, port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;
    if port != base_port {
        log!("ws"; "port {} in use, using {} instead", base_port, port);
    }

    let acceptor_hub = Arc::clone(&hub);
    thread::spawn(move || accept_loop(&listener, &acceptor_hub));
    thread::spawn(move || reap_loop(&hub));

    Ok(port)
}

fn accept_loop(listener: &TcpListener, hub: &Hub) {
    while !is_shutdown() {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("ws"; "connection from {}", addr);
                if let Err(e) = add_client(stream, hub) {
                    log!("ws"; "handshake failed: {}", e);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log!("ws"; "accept error: {}", e);
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn add_client(stream: TcpStream, hub: &Hub) -> Result<()> {
    // Blocking during the handshake and for sends; reads poll with a
    // short timeout so the reaper never stalls.
    stream.set_nonblocking(false)?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    let ws = tungstenite::accept(stream)?;
    ws.get_ref().set_read_timeout(Some(Duration::from_millis(1)))?;

    hub.register(ws);
    Ok(())
}

fn reap_loop(hub: &Hub) {
    while !is_shutdown() {
        thread::sleep(POLL_INTERVAL);
        hub.reap();
    }
    hub.close_all();
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn test_bind_skips_taken_port() {
        let (taken, port) = try_bind_port(LOCALHOST, 0, 1).unwrap();
        let (_next, next_port) = try_bind_port(LOCALHOST, port, 5).unwrap();
        assert_ne!(next_port, port);
        drop(taken);
    }

    #[test]
    fn test_silent_peer_times_out() {
        let listener = TcpListener::bind((LOCALHOST, 0)).unwrap();
        let _peer = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, _) = listener.accept().unwrap();
        let hub: Hub = Hub::new(crate::server::message::Snapshot {
            readme: String::new(),
            manifest: serde_json::from_str(r#"{"type":"package","name":"a/b","exposed-modules":[]}"#)
                .unwrap(),
            docs: Default::default(),
        });

        let started = std::time::Instant::now();
        assert!(add_client(stream, &hub).is_err());
        assert!(started.elapsed() < HANDSHAKE_TIMEOUT * 2);
        assert_eq!(hub.len(), 0);
    }

    #[test]
    fn test_bind_gives_up() {
        let (_taken, port) = try_bind_port(LOCALHOST, 0, 1).unwrap();
        assert!(try_bind_port(LOCALHOST, port, 1).is_err());
    }
}
