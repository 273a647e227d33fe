//! Broadcast hub: live clients plus the latest snapshot.
//!
//! Registration and publishing take the same lock, so a connecting client
//! either gets the old snapshot followed by the update, or the new
//! snapshot, never a mix. Readers outside the lock (HTTP) load the
//! snapshot lock-free.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tungstenite::{Message as WsMessage, WebSocket};

use super::message::{Snapshot, Update};
use crate::debug;

/// A connection the hub can push text to.
pub trait Client: Send {
    fn send_text(&mut self, text: &str) -> anyhow::Result<()>;

    /// Poll without blocking; `true` once the peer has gone away.
    fn is_closed(&mut self) -> bool {
        false
    }

    fn close(&mut self) {}
}

impl Client for WebSocket<TcpStream> {
    fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.send(WsMessage::Text(text.to_owned().into()))?;
        Ok(())
    }

    fn is_closed(&mut self) -> bool {
        match self.read() {
            Ok(WsMessage::Close(_)) => true,
            Ok(_) => false,
            Err(tungstenite::Error::Io(ref e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                false
            }
            Err(_) => true,
        }
    }

    fn close(&mut self) {
        let _ = WebSocket::close(self, None);
        let _ = self.flush();
    }
}

/// Registered client handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

struct Registry<C> {
    next_id: u64,
    clients: Vec<(ClientId, C)>,
}

/// Client registry and snapshot holder.
pub struct Hub<C = WebSocket<TcpStream>> {
    registry: Mutex<Registry<C>>,
    snapshot: ArcSwap<Snapshot>,
}

impl<C: Client> Hub<C> {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            registry: Mutex::new(Registry {
                next_id: 0,
                clients: Vec::new(),
            }),
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Latest published state.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Send the current snapshot to `client` and add it.
    ///
    /// Returns `None` when the client fails during the snapshot.
    pub fn register(&self, mut client: C) -> Option<ClientId> {
        let mut registry = self.registry.lock();

        for text in self.snapshot.load().messages() {
            if let Err(e) = client.send_text(&text) {
                debug!("ws"; "client dropped during snapshot: {}", e);
                return None;
            }
        }

        let id = ClientId(registry.next_id);
        registry.next_id += 1;
        registry.clients.push((id, client));
        debug!("ws"; "client connected (total: {})", registry.clients.len());
        Some(id)
    }

    pub fn unregister(&self, id: ClientId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.clients.len();
        registry.clients.retain(|(client_id, _)| *client_id != id);
        registry.clients.len() != before
    }

    /// Visit every client under the lock.
    pub fn for_each(&self, mut f: impl FnMut(ClientId, &mut C)) {
        let mut registry = self.registry.lock();
        for (id, client) in registry.clients.iter_mut() {
            f(*id, client);
        }
    }

    /// Apply `update` to the snapshot and push it to every client.
    ///
    /// Clients failing a send are dropped without retry.
    pub fn publish(&self, update: &Update) {
        let mut registry = self.registry.lock();

        let next = self.snapshot.load().apply(update);
        self.snapshot.store(Arc::new(next));

        let messages = update.messages();
        if messages.is_empty() {
            return;
        }

        let count = registry.clients.len();
        registry.clients.retain_mut(|(_, client)| {
            for text in &messages {
                if let Err(e) = client.send_text(text) {
                    debug!("ws"; "client disconnected: {}", e);
                    return false;
                }
            }
            true
        });
        debug!("ws"; "broadcast {} message(s) to {} client(s)", messages.len(), count);
    }

    /// Drop clients whose peer has disconnected.
    pub fn reap(&self) {
        let mut closed = Vec::new();
        self.for_each(|id, client| {
            if client.is_closed() {
                closed.push(id);
            }
        });

        for id in closed {
            if self.unregister(id) {
                debug!("ws"; "client {:?} closed (remaining: {})", id, self.len());
            }
        }
    }

    /// Close and drop every client.
    pub fn close_all(&self) {
        let mut ids = Vec::new();
        self.for_each(|id, client| {
            client.close();
            ids.push(id);
        });
        for id in ids {
            self.unregister(id);
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().clients.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::docs::Docs;
    use crate::manifest::Manifest;
    use serde_json::{Value, json};

    /// Records sent messages; fails once `fail` is set.
    #[derive(Clone, Default)]
    pub(crate) struct Recorder {
        pub(crate) sent: Arc<Mutex<Vec<String>>>,
        pub(crate) fail: Arc<std::sync::atomic::AtomicBool>,
    }

    impl Recorder {
        pub(crate) fn kinds(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .map(|m| {
                    serde_json::from_str::<Value>(m).unwrap()["type"]
                        .as_str()
                        .unwrap()
                        .to_string()
                })
                .collect()
        }

        pub(crate) fn last(&self, kind: &str) -> Option<Value> {
            self.sent
                .lock()
                .iter()
                .map(|m| serde_json::from_str::<Value>(m).unwrap())
                .filter(|m| m["type"] == kind)
                .last()
        }
    }

    impl Client for Recorder {
        fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                anyhow::bail!("connection reset");
            }
            self.sent.lock().push(text.to_string());
            Ok(())
        }

        fn is_closed(&mut self) -> bool {
            self.fail.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    fn manifest(name: &str) -> Manifest {
        serde_json::from_value(json!({"type": "package", "name": name, "exposed-modules": []}))
            .unwrap()
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            readme: "# readme".into(),
            manifest: manifest("a/b"),
            docs: Docs::default(),
        }
    }

    #[test]
    fn test_register_sends_snapshot() {
        let hub = Hub::new(snapshot());
        let client = Recorder::default();

        assert!(hub.register(client.clone()).is_some());
        assert_eq!(client.kinds(), vec!["readme", "manifest", "docs"]);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_publish_orders_manifest_before_docs() {
        let hub = Hub::new(snapshot());
        let client = Recorder::default();
        hub.register(client.clone());
        client.sent.lock().clear();

        hub.publish(&Update {
            readme: None,
            manifest: Some(manifest("c/d")),
            docs: Some(Docs::Modules(vec![json!({"name": "Main"})])),
        });

        assert_eq!(client.kinds(), vec!["manifest", "docs"]);
    }

    #[test]
    fn test_late_client_gets_current_state() {
        let hub = Hub::new(snapshot());
        hub.publish(&Update {
            readme: Some("# new".into()),
            manifest: None,
            docs: Some(Docs::Modules(vec![json!({"name": "Main"})])),
        });

        let late = Recorder::default();
        hub.register(late.clone());

        assert_eq!(late.kinds(), vec!["readme", "manifest", "docs"]);
        assert_eq!(late.last("readme").unwrap()["data"], "# new");
        assert_eq!(late.last("docs").unwrap()["data"][0]["name"], "Main");
        assert_eq!(hub.snapshot().readme, "# new");
    }

    #[test]
    fn test_failed_client_skipped() {
        let hub = Hub::new(snapshot());
        let alive = Recorder::default();
        let dead = Recorder::default();
        hub.register(alive.clone());
        hub.register(dead.clone());
        dead.fail.store(true, std::sync::atomic::Ordering::SeqCst);

        hub.publish(&Update {
            readme: Some("x".into()),
            ..Default::default()
        });

        assert_eq!(hub.len(), 1);
        assert_eq!(alive.kinds().last().map(String::as_str), Some("readme"));
    }

    #[test]
    fn test_unregister_and_reap() {
        let hub = Hub::new(snapshot());
        let a = Recorder::default();
        let b = Recorder::default();
        let id = hub.register(a.clone()).unwrap();
        hub.register(b.clone()).unwrap();

        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));
        assert_eq!(hub.len(), 1);

        b.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        hub.reap();
        assert_eq!(hub.len(), 0);
    }

    #[test]
    fn test_reap_keeps_live_clients() {
        let hub = Hub::new(snapshot());
        let live = Recorder::default();
        let gone = Recorder::default();
        hub.register(live.clone()).unwrap();
        hub.register(gone.clone()).unwrap();

        gone.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        hub.reap();
        assert_eq!(hub.len(), 1);

        hub.publish(&Update {
            readme: Some("after".into()),
            ..Default::default()
        });
        assert_eq!(live.last("readme").unwrap()["data"], "after");
    }

    #[test]
    fn test_close_all_empties_registry() {
        let hub = Hub::new(snapshot());
        hub.register(Recorder::default());
        hub.register(Recorder::default());

        hub.close_all();
        assert_eq!(hub.len(), 0);
    }

    #[test]
    fn test_for_each_visits_all() {
        let hub = Hub::new(snapshot());
        hub.register(Recorder::default());
        hub.register(Recorder::default());

        let mut seen = Vec::new();
        hub.for_each(|id, _| seen.push(id));
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0], seen[1]);
    }

    #[test]
    fn test_register_rejects_broken_client() {
        let hub = Hub::new(snapshot());
        let broken = Recorder::default();
        broken.fail.store(true, std::sync::atomic::Ordering::SeqCst);

        assert!(hub.register(broken).is_none());
        assert_eq!(hub.len(), 0);
    }
}
