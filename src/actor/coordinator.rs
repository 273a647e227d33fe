//! Actor Coordinator - Wires up the Live Preview Actor System
//!
//! Creates the channels, subscribes the watcher, and runs both actors until
//! the shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::build::BuildActor;
use super::messages::{BuildMsg, WatchMsg};
use super::watch::WatchActor;
use crate::preview::Preview;
use crate::server::hub::Hub;
use crate::{debug, log};

const CHANNEL_BUFFER: usize = 32;

/// How often the shutdown signal is polled.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Grace period for actors to stop after shutdown.
const STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// Coordinator - wires up and runs the actor system.
pub struct Coordinator {
    preview: Arc<Mutex<Preview>>,
    hub: Arc<Hub>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn new(preview: Arc<Mutex<Preview>>, hub: Arc<Hub>) -> Self {
        Self {
            preview,
            hub,
            shutdown_rx: None,
        }
    }

    /// Set shutdown signal receiver.
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Run the actor system.
    pub async fn run(self) -> Result<()> {
        let (build_tx, build_rx) = mpsc::channel::<BuildMsg>(CHANNEL_BUFFER);
        let (watch_tx, watch_rx) = mpsc::channel::<WatchMsg>(CHANNEL_BUFFER);

        let plan = self.preview.lock().watch_plan();
        let watch_actor = WatchActor::new(plan, watch_rx, build_tx.clone())
            .map_err(|e| anyhow::anyhow!("watcher failed: {}", e))?;
        let build_actor = BuildActor::new(build_rx, watch_tx.clone(), self.hub, self.preview);

        debug!("actor"; "start");
        let mut watch_handle = tokio::spawn(watch_actor.run());
        let mut build_handle = tokio::spawn(build_actor.run());

        if let Some(rx) = self.shutdown_rx {
            loop {
                if rx.try_recv().is_ok() {
                    debug!("actor"; "shutdown signal received");
                    break;
                }
                if watch_handle.is_finished() || build_handle.is_finished() {
                    log!("actor"; "actor stopped unexpectedly");
                    break;
                }
                tokio::time::sleep(SHUTDOWN_POLL).await;
            }
        } else {
            tokio::select! {
                _ = &mut watch_handle => {}
                _ = &mut build_handle => {}
            }
        }

        let _ = watch_tx.send(WatchMsg::Shutdown).await;
        let _ = build_tx.send(BuildMsg::Shutdown).await;
        let _ = tokio::time::timeout(STOP_TIMEOUT, async {
            let _ = watch_handle.await;
            let _ = build_handle.await;
        })
        .await;

        debug!("actor"; "stopped");
        Ok(())
    }
}
