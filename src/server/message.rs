//! Broadcast message protocol.
//!
//! Every message is `{"type": "readme" | "manifest" | "docs", "data": ...}`.
//! A connecting client gets the current [`Snapshot`]; later rebuilds send
//! only what changed, as an [`Update`].

use serde::Serialize;

use crate::docs::Docs;
use crate::manifest::Manifest;

/// Message pushed to clients
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Message<'a> {
    Readme(&'a str),
    Manifest(&'a Manifest),
    Docs(&'a Docs),
}

impl Message<'_> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            crate::log!("ws"; "cannot encode message: {}", e);
            String::new()
        })
    }
}

/// Full current state, as served to new clients and over HTTP.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub readme: String,
    pub manifest: Manifest,
    pub docs: Docs,
}

impl Snapshot {
    /// Messages in delivery order: readme, manifest, docs.
    pub fn messages(&self) -> Vec<String> {
        vec![
            Message::Readme(&self.readme).to_json(),
            Message::Manifest(&self.manifest).to_json(),
            Message::Docs(&self.docs).to_json(),
        ]
    }

    /// Snapshot with `update` applied.
    pub fn apply(&self, update: &Update) -> Self {
        Self {
            readme: update.readme.clone().unwrap_or_else(|| self.readme.clone()),
            manifest: update.manifest.clone().unwrap_or_else(|| self.manifest.clone()),
            docs: update.docs.clone().unwrap_or_else(|| self.docs.clone()),
        }
    }
}

/// The parts refreshed by one rebuild cycle.
#[derive(Debug, Clone, Default)]
pub struct Update {
    pub readme: Option<String>,
    pub manifest: Option<Manifest>,
    pub docs: Option<Docs>,
}

impl Update {
    pub fn is_empty(&self) -> bool {
        self.readme.is_none() && self.manifest.is_none() && self.docs.is_none()
    }

    /// Messages in delivery order; `manifest` always precedes `docs`.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = Vec::with_capacity(3);
        if let Some(readme) = &self.readme {
            messages.push(Message::Readme(readme).to_json());
        }
        if let Some(manifest) = &self.manifest {
            messages.push(Message::Manifest(manifest).to_json());
        }
        if let Some(docs) = &self.docs {
            messages.push(Message::Docs(docs).to_json());
        }
        messages
    }
}
