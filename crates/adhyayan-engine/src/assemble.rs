//! Context assembly from heterogeneous stored records.
//!
//! Pulls a bounded amount of prior content — recent sessions, extracted
//! evidence for an image, recent chat entries — from collaborator stores
//! into one immutable bundle. A missing or empty source is simply omitted
//! with a zero count; assembly never fails, so downstream prompt
//! construction degrades gracefully instead of erroring.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ContextConfig;
use crate::types::{ChatEntry, ContextRefs, EvidenceRecord, SessionRecord};

// ── Store traits (persistence is a collaborator, injected) ────────────────

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Most-recent-first, capped at `limit`.
    async fn recent_sessions(&self, limit: usize) -> anyhow::Result<Vec<SessionRecord>>;
    async fn session(&self, id: &str) -> anyhow::Result<Option<SessionRecord>>;
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn evidence_for_image(&self, image_id: &str) -> anyhow::Result<Vec<EvidenceRecord>>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Most-recent-first, capped at `limit`.
    async fn recent_entries(
        &self,
        session_id: Option<&str>,
        limit: usize,
    ) -> anyhow::Result<Vec<ChatEntry>>;
}

// ── Bundle types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Session,
    Evidence,
    Chat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub source: SourceKind,
    pub text: String,
    pub truncated_len: usize,
}

/// Assembled, size-bounded context. Built fresh per request and never
/// mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextBundle {
    items: Vec<ContextItem>,
    session_count: usize,
    evidence_count: usize,
    chat_count: usize,
    total_chars: usize,
}

impl ContextBundle {
    pub fn items(&self) -> &[ContextItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn session_count(&self) -> usize {
        self.session_count
    }

    pub fn evidence_count(&self) -> usize {
        self.evidence_count
    }

    pub fn chat_count(&self) -> usize {
        self.chat_count
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    /// Render with numbered document boundaries for prompt construction.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("[Context {}] {}", i + 1, item.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

pub struct ContextAssembler {
    sessions: Option<Arc<dyn SessionStore>>,
    evidence: Option<Arc<dyn EvidenceStore>>,
    chat: Option<Arc<dyn ChatStore>>,
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(
        sessions: Option<Arc<dyn SessionStore>>,
        evidence: Option<Arc<dyn EvidenceStore>>,
        chat: Option<Arc<dyn ChatStore>>,
        config: ContextConfig,
    ) -> Self {
        Self {
            sessions,
            evidence,
            chat,
            config,
        }
    }

    /// Build a bundle for the given refs. Store errors are logged and the
    /// affected source is skipped; this function has no failure path.
    pub async fn assemble(&self, refs: &ContextRefs) -> ContextBundle {
        let mut bundle = ContextBundle::default();

        for record in self.pull_sessions(refs).await {
            let text = format!("Session \"{}\": {}", record.title, record.summary);
            if !self.push_item(&mut bundle, SourceKind::Session, text) {
                return bundle;
            }
            bundle.session_count += 1;
        }

        for record in self.pull_evidence(refs).await {
            let text = format!("Evidence ({}): {}", record.source_locator, record.text);
            if !self.push_item(&mut bundle, SourceKind::Evidence, text) {
                return bundle;
            }
            bundle.evidence_count += 1;
        }

        for entry in self.pull_chat(refs).await {
            let text = format!("{}: {}", entry.role, entry.text);
            if !self.push_item(&mut bundle, SourceKind::Chat, text) {
                return bundle;
            }
            bundle.chat_count += 1;
        }

        bundle
    }

    async fn pull_sessions(&self, refs: &ContextRefs) -> Vec<SessionRecord> {
        let store = match &self.sessions {
            Some(store) => store,
            None => return Vec::new(),
        };

        if let Some(session_id) = &refs.session_id {
            match store.session(session_id).await {
                Ok(Some(record)) => return vec![record],
                Ok(None) => return Vec::new(),
                Err(e) => {
                    tracing::debug!(session_id = %session_id, error = %e, "session lookup failed");
                    return Vec::new();
                }
            }
        }

        let limit = refs.limit.unwrap_or(self.config.max_sessions).min(self.config.max_sessions);
        match store.recent_sessions(limit).await {
            Ok(records) => records,
            Err(e) => {
                tracing::debug!(error = %e, "recent sessions lookup failed");
                Vec::new()
            }
        }
    }

    async fn pull_evidence(&self, refs: &ContextRefs) -> Vec<EvidenceRecord> {
        let (store, image_id) = match (&self.evidence, &refs.image_id) {
            (Some(store), Some(image_id)) => (store, image_id),
            _ => return Vec::new(),
        };
        match store.evidence_for_image(image_id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::debug!(image_id = %image_id, error = %e, "evidence lookup failed");
                Vec::new()
            }
        }
    }

    async fn pull_chat(&self, refs: &ContextRefs) -> Vec<ChatEntry> {
        let store = match &self.chat {
            Some(store) => store,
            None => return Vec::new(),
        };
        match store
            .recent_entries(refs.session_id.as_deref(), self.config.max_chat_entries)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(error = %e, "chat history lookup failed");
                Vec::new()
            }
        }
    }

    /// Truncate to the per-item budget and append, honoring the aggregate
    /// cap. Returns false once the bundle is full.
    fn push_item(&self, bundle: &mut ContextBundle, source: SourceKind, text: String) -> bool {
        if bundle.total_chars >= self.config.bundle_char_cap {
            return false;
        }
        let truncated: String = text.chars().take(self.config.item_char_budget).collect();
        let truncated_len = truncated.chars().count();
        bundle.total_chars += truncated_len;
        bundle.items.push(ContextItem {
            source,
            text: truncated,
            truncated_len,
        });
        true
    }
}

// ── In-memory stores (tests and embedding callers) ────────────────────────

#[derive(Default)]
pub struct InMemorySessionStore {
    records: Mutex<Vec<SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn push(&self, record: SessionRecord) {
        self.records.lock().push(record);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn recent_sessions(&self, limit: usize) -> anyhow::Result<Vec<SessionRecord>> {
        let records = self.records.lock();
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    async fn session(&self, id: &str) -> anyhow::Result<Option<SessionRecord>> {
        Ok(self.records.lock().iter().find(|r| r.id == id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryEvidenceStore {
    records: Mutex<Vec<(String, EvidenceRecord)>>,
}

impl InMemoryEvidenceStore {
    pub fn push(&self, image_id: impl Into<String>, record: EvidenceRecord) {
        self.records.lock().push((image_id.into(), record));
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn evidence_for_image(&self, image_id: &str) -> anyhow::Result<Vec<EvidenceRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|(id, _)| id == image_id)
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryChatStore {
    entries: Mutex<Vec<ChatEntry>>,
}

impl InMemoryChatStore {
    pub fn push(&self, entry: ChatEntry) {
        self.entries.lock().push(entry);
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn recent_entries(
        &self,
        _session_id: Option<&str>,
        limit: usize,
    ) -> anyhow::Result<Vec<ChatEntry>> {
        let entries = self.entries.lock();
        let mut recent: Vec<ChatEntry> = entries.iter().rev().take(limit).cloned().collect();
        recent.reverse();
        Ok(recent)
    }
}
