//! Preview server: HTTP pages plus the live-update WebSocket.
//!
//! ```text
//! main --> serve() --> ws::start (hub clients)
//!                  --> actors thread (watch + build)
//!                  --> HTTP request loop (blocks until Ctrl+C)
//! ```

mod http;
pub mod hub;
pub mod message;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;
use tiny_http::Server;

use crate::actor::Coordinator;
use crate::config::ServeConfig;
use crate::core::register_server;
use crate::preview::Preview;
use crate::{debug, log};
use hub::Hub;
use message::Snapshot;

/// Serve `preview` until Ctrl+C.
///
/// The HTTP port is taken as given; failing to bind it is fatal.
pub fn serve(preview: Preview, snapshot: Snapshot, config: &ServeConfig) -> Result<()> {
    let addr = SocketAddr::new(config.interface, config.port);
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("cannot listen on {}: {}", addr, e))?;
    let server = Arc::new(server);

    let hub = Arc::new(Hub::new(snapshot));
    let ws_port = ws::start(config.interface, config.ws_port, Arc::clone(&hub))
        .context("cannot start WebSocket server")?;
    debug!("ws"; "ws://{}:{}", config.interface, ws_port);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);

    let url = format!("http://{addr}");
    log!("serve"; "{}", url);
    if config.browser
        && let Err(e) = open::that(&url)
    {
        log!("serve"; "cannot open browser: {}", e);
    }

    let preview = Arc::new(Mutex::new(preview));
    let actor_handle = config
        .reload
        .then(|| spawn_actors(preview, Arc::clone(&hub), shutdown_rx));

    run_request_loop(&server, &hub, ws_port)?;
    wait_for_shutdown(actor_handle);
    Ok(())
}

fn run_request_loop(server: &Server, hub: &Arc<Hub>, ws_port: u16) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .context("failed to create thread pool")?;

    for request in server.incoming_requests() {
        let hub = Arc::clone(hub);
        pool.spawn(move || {
            if let Err(e) = http::handle_request(request, &hub, ws_port) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Spawn the actor system for file watching and live updates.
fn spawn_actors(
    preview: Arc<Mutex<Preview>>,
    hub: Arc<Hub>,
    shutdown_rx: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log!("actor"; "cannot start runtime: {}", e);
                return;
            }
        };

        rt.block_on(async {
            let coordinator = Coordinator::new(preview, hub).with_shutdown_signal(shutdown_rx);
            if let Err(e) = coordinator.run().await {
                log!("actor"; "error: {}", e);
            }
        });
    })
}

/// Wait for actor system to shutdown gracefully (max 2 seconds).
fn wait_for_shutdown(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else { return };

    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
