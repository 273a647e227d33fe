//! Watch Actor
//!
//! Watches the project and sends debounced rebuild requests to the
//! BuildActor.
//!
//! ```text
//! notify → WatchPlan::classify → Debouncer → RebuildRequest
//! ```
//!
//! The watcher is recreated whenever the BuildActor reports a new
//! [`WatchPlan`] (manifest kind or source directories changed).

mod debouncer;
mod plan;

use debouncer::Debouncer;
pub use plan::{ChangeClass, WatchPlan};

use std::time::Instant;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::messages::{BuildMsg, RebuildRequest, WatchMsg};
use crate::{debug, log};

type EventTx = mpsc::UnboundedSender<notify::Event>;

/// Watch Actor - turns file events into rebuild requests
pub struct WatchActor {
    rx: mpsc::Receiver<WatchMsg>,
    build_tx: mpsc::Sender<BuildMsg>,
    plan: WatchPlan,
    debouncer: Debouncer,
    event_tx: EventTx,
    event_rx: mpsc::UnboundedReceiver<notify::Event>,
    /// Kept alive for the subscription; replaced on re-subscription.
    _watcher: RecommendedWatcher,
}

impl WatchActor {
    /// Subscribe to `plan` immediately, buffering events until `run`.
    pub fn new(
        plan: WatchPlan,
        rx: mpsc::Receiver<WatchMsg>,
        build_tx: mpsc::Sender<BuildMsg>,
    ) -> notify::Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let watcher = subscribe(&plan, event_tx.clone())?;

        Ok(Self {
            rx,
            build_tx,
            plan,
            debouncer: Debouncer::default(),
            event_tx,
            event_rx,
            _watcher: watcher,
        })
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        loop {
            let deadline = self.debouncer.deadline();

            tokio::select! {
                biased;
                msg = self.rx.recv() => match msg {
                    Some(WatchMsg::Resubscribe(plan)) => self.resubscribe(plan),
                    Some(WatchMsg::Shutdown) | None => break,
                },
                Some(event) = self.event_rx.recv() => self.on_event(event),
                () = sleep_until(deadline) => {
                    if self.flush().await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("watch"; "stopped");
    }

    fn on_event(&mut self, event: notify::Event) {
        if !is_content_change(&event.kind) {
            return;
        }

        let now = Instant::now();
        for path in event.paths {
            if self.plan.classify(&path).is_some() {
                debug!("watch"; "{:?} {}", event.kind, path.display());
                self.debouncer.push(path, now);
            }
        }
    }

    /// Send the coalesced request if the debounce window closed.
    ///
    /// Returns `Err(())` if the BuildActor shut down.
    async fn flush(&mut self) -> Result<(), ()> {
        let Some(path) = self.debouncer.poll(Instant::now()) else {
            return Ok(());
        };
        let Some(class) = self.plan.classify(&path) else {
            return Ok(());
        };

        let relative = path.strip_prefix(self.plan.root()).unwrap_or(&path);
        log!("watch"; "{} changed", relative.display());

        self.build_tx
            .send(BuildMsg::Rebuild(RebuildRequest::for_change(class)))
            .await
            .map_err(|_| ())
    }

    fn resubscribe(&mut self, plan: WatchPlan) {
        if plan == self.plan {
            return;
        }
        match subscribe(&plan, self.event_tx.clone()) {
            Ok(watcher) => {
                // Dropping the old watcher ends its subscription.
                self._watcher = watcher;
                self.plan = plan;
                log!("watch"; "watching {} directories", self.plan.roots().len());
            }
            Err(e) => log!("watch"; "cannot re-subscribe, keeping previous watch: {}", e),
        }
    }
}

/// Create a watcher for every existing root of `plan`.
fn subscribe(plan: &WatchPlan, tx: EventTx) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => log!("watch"; "notify error: {}", e),
        }
    })?;

    for root in plan.roots() {
        if !root.path.exists() {
            debug!("watch"; "skipping missing {}", root.path.display());
            continue;
        }
        let mode = if root.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&root.path, mode)?;
        debug!("watch"; "watching {} ({:?})", root.path.display(), mode);
    }

    Ok(watcher)
}

/// Create, modify, and remove; metadata-only changes are noise.
fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(modify) => !matches!(modify, notify::event::ModifyKind::Metadata(_)),
        _ => false,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at.into()).await,
        None => std::future::pending().await,
    }
}
