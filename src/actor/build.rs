//! Build Actor - Rebuild and Publish
//!
//! Receives rebuild requests from the WatchActor, refreshes the
//! [`Preview`] off the async runtime, and publishes the result to the hub.
//! Requests queued while a build runs are merged into one follow-up build.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::messages::{BuildMsg, RebuildRequest, WatchMsg};
use crate::actor::watch::WatchPlan;
use crate::docs::Docs;
use crate::logger::{status_error, status_success};
use crate::preview::Preview;
use crate::server::hub::{Client, Hub};
use crate::server::message::Update;
use crate::{debug, log};

pub struct BuildActor<C: Client + 'static> {
    rx: mpsc::Receiver<BuildMsg>,
    watch_tx: mpsc::Sender<WatchMsg>,
    hub: Arc<Hub<C>>,
    preview: Arc<Mutex<Preview>>,
    plan: WatchPlan,
}

impl<C: Client + 'static> BuildActor<C> {
    pub fn new(
        rx: mpsc::Receiver<BuildMsg>,
        watch_tx: mpsc::Sender<WatchMsg>,
        hub: Arc<Hub<C>>,
        preview: Arc<Mutex<Preview>>,
    ) -> Self {
        let plan = preview.lock().watch_plan();
        Self {
            rx,
            watch_tx,
            hub,
            preview,
            plan,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            let BuildMsg::Rebuild(mut request) = msg else {
                break;
            };

            // Coalesce whatever queued up behind this request.
            let mut shutdown = false;
            while let Ok(next) = self.rx.try_recv() {
                match next {
                    BuildMsg::Rebuild(more) => request = request.merge(more),
                    BuildMsg::Shutdown => {
                        shutdown = true;
                        break;
                    }
                }
            }
            if shutdown {
                break;
            }

            self.handle_rebuild(request).await;
        }
        debug!("build"; "stopped");
    }

    async fn handle_rebuild(&mut self, request: RebuildRequest) {
        debug!("build"; "rebuild {:?}", request);
        let preview = Arc::clone(&self.preview);
        let result = tokio::task::spawn_blocking(move || {
            let mut preview = preview.lock();
            let update = preview.rebuild(request);
            (update, preview.watch_plan())
        })
        .await;

        let (update, plan) = match result {
            Ok(done) => done,
            Err(e) => {
                log!("build"; "rebuild task failed: {}", e);
                return;
            }
        };

        report(&update);
        if !update.is_empty() {
            self.hub.publish(&update);
        }

        if plan != self.plan {
            log!("watch"; "project layout changed, re-subscribing");
            self.plan = plan.clone();
            if self.watch_tx.send(WatchMsg::Resubscribe(plan)).await.is_err() {
                debug!("build"; "watch actor gone");
            }
        }
    }
}

/// Print the rebuild outcome on the status line.
fn report(update: &Update) {
    match &update.docs {
        Some(docs) => report_docs(docs),
        None if update.readme.is_some() => status_success("readme updated"),
        None => {}
    }
}

/// Status line for a finished documentation build.
pub fn report_docs(docs: &Docs) {
    match docs {
        Docs::Report(report) => status_error(&report.summary(), &report.plain_text()),
        Docs::Modules(modules) => {
            status_success(&format!("documentation built ({} modules)", modules.len()));
        }
    }
}
