//! Per-user session state.
//!
//! A [`Session`] owns one file registry, one context selector, one
//! conversation log, and the link to the remote services. Front-ends hold a
//! session (directly or behind a lock) and call into it for every user
//! action; nothing here is global.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docchat_config::AppConfig;
use docchat_core::error::{Error, Result};
use docchat_core::file::{FileRegistry, UploadedFile};
use docchat_core::message::{ConversationLog, Message, transcript_filename};
use docchat_core::provider::{FileStore, GenerationService};
use docchat_core::selection::{ContextSelection, ContextSelector};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::orchestrator::Orchestrator;

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Whether the remote client could be constructed for this session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Connectivity {
    Connected,
    Disconnected { reason: String },
}

/// Remote services a session talks to. Fixed for the session's lifetime.
#[derive(Clone)]
enum Link {
    Connected {
        store: Arc<dyn FileStore>,
        orchestrator: Arc<Orchestrator>,
    },
    Disconnected {
        reason: String,
    },
}

/// Counters shown next to the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub files: usize,
    pub selected: usize,
    pub messages: usize,
    pub total_bytes: u64,
}

/// A downloadable copy of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub filename: String,
    pub body: String,
}

pub struct Session {
    id: SessionId,
    registry: FileRegistry,
    selector: ContextSelector,
    log: ConversationLog,
    link: Link,
    retention_hours: u32,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// How long the storage service keeps uploaded files.
    pub fn retention_hours(&self) -> u32 {
        self.retention_hours
    }

    pub fn connectivity(&self) -> Connectivity {
        match &self.link {
            Link::Connected { .. } => Connectivity::Connected,
            Link::Disconnected { reason } => Connectivity::Disconnected {
                reason: reason.clone(),
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.link, Link::Connected { .. })
    }

    fn services(&self) -> Result<(Arc<dyn FileStore>, Arc<Orchestrator>)> {
        match &self.link {
            Link::Connected {
                store,
                orchestrator,
            } => Ok((store.clone(), orchestrator.clone())),
            Link::Disconnected { reason } => Err(Error::Disconnected {
                reason: reason.clone(),
            }),
        }
    }

    // --- Files ---

    /// Validate an upload before its body is read.
    pub fn check_upload(&self, filename: &str, size_bytes: u64) -> Result<()> {
        self.services()?;
        self.registry.check_admissible(filename, size_bytes)?;
        Ok(())
    }

    /// Send a document to the storage service and register it.
    pub async fn upload(
        &mut self,
        raw_bytes: Vec<u8>,
        filename: &str,
        size_bytes: u64,
    ) -> Result<UploadedFile> {
        let (store, _) = self.services()?;
        let file = self
            .registry
            .upload(store.as_ref(), raw_bytes, filename, size_bytes)
            .await?;
        info!(session = %self.id, file = %file.name, "File registered");
        Ok(file)
    }

    /// Remove one file locally. The remote copy expires on its own.
    pub fn remove_file(&mut self, name: &str) -> Result<UploadedFile> {
        self.services()?;
        Ok(self.registry.remove(name)?)
    }

    pub fn clear_files(&mut self) -> Result<usize> {
        self.services()?;
        self.selector.clear();
        Ok(self.registry.clear())
    }

    pub fn files(&self) -> &[UploadedFile] {
        self.registry.list()
    }

    // --- Selection ---

    /// Choose which files go with the next prompts. Unknown names are dropped.
    pub fn select<I, S>(&mut self, names: I) -> Result<ContextSelection>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services()?;
        Ok(self.selector.set_selection(names, &self.registry))
    }

    pub fn selection(&self) -> ContextSelection {
        self.selector.current(&self.registry)
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selector.is_selected(name) && self.registry.contains(name)
    }

    // --- Conversation ---

    /// Ask about the selected files. Generation failures come back as the
    /// returned message, not as an error.
    pub async fn ask(&mut self, prompt: &str) -> Result<Message> {
        let (_, orchestrator) = self.services()?;
        let selection = self.selection();
        Ok(orchestrator.ask(prompt, &selection, &mut self.log).await)
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    /// Start over with an empty log. Files and selection are kept.
    pub fn new_conversation(&mut self) {
        info!(session = %self.id, "New conversation");
        self.log.clear();
    }

    pub fn clear_history(&mut self) {
        info!(session = %self.id, messages = self.log.len(), "Clearing chat history");
        self.log.clear();
    }

    pub fn export(&self) -> Transcript {
        self.export_at(Utc::now())
    }

    pub fn export_at(&self, at: DateTime<Utc>) -> Transcript {
        Transcript {
            filename: transcript_filename(at),
            body: self.log.export(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            files: self.registry.len(),
            selected: self.selection().len(),
            messages: self.log.len(),
            total_bytes: self.registry.list().iter().map(|f| f.size_bytes).sum(),
        }
    }
}

/// Creates sessions that share one set of remote clients.
#[derive(Clone)]
pub struct SessionFactory {
    link: Link,
    max_file_bytes: u64,
    retention_hours: u32,
}

impl SessionFactory {
    pub fn connected(store: Arc<dyn FileStore>, orchestrator: Orchestrator) -> Self {
        Self {
            link: Link::Connected {
                store,
                orchestrator: Arc::new(orchestrator),
            },
            max_file_bytes: docchat_core::file::MAX_FILE_BYTES,
            retention_hours: 48,
        }
    }

    /// Every session from this factory reports `reason` and refuses to mutate.
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self {
            link: Link::Disconnected {
                reason: reason.into(),
            },
            max_file_bytes: docchat_core::file::MAX_FILE_BYTES,
            retention_hours: 48,
        }
    }

    /// Build the Gemini client from `config`, failing with
    /// [`Error::Connection`] when it cannot be constructed.
    pub fn connect(config: &AppConfig) -> Result<Self> {
        let provider =
            Arc::new(docchat_providers::build_from_config(config).map_err(Error::Connection)?);
        let generator: Arc<dyn GenerationService> = provider.clone();
        let orchestrator = Orchestrator::new(generator)
            .with_model(&config.model)
            .with_temperature(config.temperature)
            .with_max_output_tokens(config.max_output_tokens)
            .with_system_instruction(config.instructions.render());
        info!(model = %config.model, "Connected to Gemini");
        Ok(Self::connected(provider, orchestrator).with_limits(config))
    }

    /// Like [`SessionFactory::connect`], but a construction failure is not
    /// fatal: it yields a factory of disconnected sessions that report the
    /// connection error as their reason.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::connect(config).unwrap_or_else(|e| {
            warn!(error = %e, "Gemini client unavailable; sessions will be disconnected");
            Self::disconnected(e.to_string()).with_limits(config)
        })
    }

    fn with_limits(self, config: &AppConfig) -> Self {
        self.with_max_file_bytes(config.uploads.max_file_bytes)
            .with_retention_hours(config.uploads.retention_hours)
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    pub fn with_retention_hours(mut self, hours: u32) -> Self {
        self.retention_hours = hours;
        self
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.link, Link::Connected { .. })
    }

    pub fn new_session(&self) -> Session {
        let session = Session {
            id: SessionId::new(),
            registry: FileRegistry::new().with_max_file_bytes(self.max_file_bytes),
            selector: ContextSelector::new(),
            log: ConversationLog::new(),
            link: self.link.clone(),
            retention_hours: self.retention_hours,
            created_at: Utc::now(),
        };
        info!(session = %session.id, connected = session.is_connected(), "Session created");
        session
    }
}
