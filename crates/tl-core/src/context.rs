//! Diagnostics collection for a conversion run.
//!
//! A [`DiagnosticsContext`] is owned by the caller and passed into every
//! pipeline call. It keeps every diagnostic for the persisted report, and
//! separately remembers which messages were already shown live so repeated
//! identical messages are logged once per run.
//!
//! # Thread Safety
//!
//! `DiagnosticsContext` is a plain value: give each independent conversion its
//! own. When several runs in one process should share live dedup (for example
//! parallel conversions feeding one terminal), use [`SharedDiagnostics`], which
//! serializes access behind a mutex. Either kind must be [`reset`] between
//! logically distinct runs.
//!
//! [`reset`]: DiagnosticsContext::reset

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::diagnostic::{Diagnostic, DiagnosticCode, Severity};

/// Append-only diagnostics collector for one run.
#[derive(Debug, Clone)]
pub struct DiagnosticsContext {
    diagnostics: Vec<Diagnostic>,
    shown: HashSet<String>,
    live: bool,
}

impl Default for DiagnosticsContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsContext {
    /// Creates a context that logs first-seen messages through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            shown: HashSet::new(),
            live: true,
        }
    }

    /// Creates a context that only collects, never logs.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            live: false,
            ..Self::new()
        }
    }

    /// Records a diagnostic.
    ///
    /// Returns `true` when the message had not been seen in this run (and was
    /// therefore displayed). The diagnostic is stored either way.
    pub fn emit(&mut self, diagnostic: Diagnostic) -> bool {
        let first_seen = self.shown.insert(diagnostic.message.clone());
        if first_seen && self.live {
            display(&diagnostic);
        }
        self.diagnostics.push(diagnostic);
        first_seen
    }

    /// Records every diagnostic from another context.
    pub fn absorb(&mut self, other: &Self) -> usize {
        other
            .diagnostics
            .iter()
            .filter(|diagnostic| self.emit((*diagnostic).clone()))
            .count()
    }

    /// Clears all state so the context can serve an unrelated run.
    pub fn reset(&mut self) {
        self.diagnostics.clear();
        self.shown.clear();
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics in `(line_number, code, message)` order.
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut sorted: Vec<_> = self.diagnostics.iter().collect();
        sorted.sort();
        sorted
    }

    /// Sorted copies of the diagnostics recorded after the first `mark`.
    pub fn since(&self, mark: usize) -> Vec<Diagnostic> {
        let mut recent = self.diagnostics.get(mark..).unwrap_or_default().to_vec();
        recent.sort();
        recent
    }

    /// Sorted diagnostics bucketed by code, for report rendering.
    pub fn grouped(&self) -> BTreeMap<DiagnosticCode, Vec<&Diagnostic>> {
        let mut groups: BTreeMap<DiagnosticCode, Vec<&Diagnostic>> = BTreeMap::new();
        for diagnostic in self.sorted() {
            groups.entry(diagnostic.code).or_default().push(diagnostic);
        }
        groups
    }

    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

fn display(diagnostic: &Diagnostic) {
    let code = diagnostic.code.as_str();
    let line = diagnostic.line_number;
    match diagnostic.severity {
        Severity::Error => tracing::error!(code, line, "{}", diagnostic.message),
        Severity::Warn => tracing::warn!(code, line, "{}", diagnostic.message),
        Severity::Info => tracing::info!(code, line, "{}", diagnostic.message),
    }
}

/// Process-wide diagnostics buffer shared between concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct SharedDiagnostics {
    inner: Arc<Mutex<DiagnosticsContext>>,
}

impl SharedDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DiagnosticsContext> {
        // A panic while holding the lock cannot leave the collector half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn emit(&self, diagnostic: Diagnostic) -> bool {
        self.lock().emit(diagnostic)
    }

    /// Merges a finished run's diagnostics, returning how many were new.
    pub fn absorb(&self, run: &DiagnosticsContext) -> usize {
        self.lock().absorb(run)
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> DiagnosticsContext {
        self.lock().clone()
    }
}
