//! Context selection: which uploaded files ride along with the next prompt.
//!
//! The selector only remembers the names the user ticked. The actual
//! selection is always computed against the live registry, so a file that
//! was removed after being ticked silently drops out.

use std::collections::HashSet;

use serde::Serialize;

use crate::file::{FileRegistry, UploadedFile};
use crate::provider::RemoteHandle;

/// The files attached to a generation request, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextSelection {
    files: Vec<UploadedFile>,
}

impl ContextSelection {
    /// An empty selection (no context files).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    /// Names of the selected files, in selection order.
    pub fn names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }

    /// Remote handles of the selected files, in selection order.
    pub fn handles(&self) -> impl Iterator<Item = &RemoteHandle> {
        self.files.iter().map(|f| &f.remote)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Holds the requested file names between interactions.
#[derive(Debug, Clone, Default)]
pub struct ContextSelector {
    requested: HashSet<String>,
}

impl ContextSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection. Names missing from the registry are dropped.
    pub fn set_selection<I, S>(&mut self, names: I, registry: &FileRegistry) -> ContextSelection
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| registry.contains(name))
            .collect();
        self.current(registry)
    }

    /// The last selection, re-filtered against the live registry.
    pub fn current(&self, registry: &FileRegistry) -> ContextSelection {
        ContextSelection {
            files: registry
                .list()
                .iter()
                .filter(|f| self.requested.contains(&f.name))
                .cloned()
                .collect(),
        }
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.requested.contains(name)
    }

    /// Drop every requested name.
    pub fn clear(&mut self) {
        self.requested.clear();
    }
}
