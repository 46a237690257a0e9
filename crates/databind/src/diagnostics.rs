use databind_scene::NodeId;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// The expression did not compile; the watcher was dropped.
    Compile,
    /// The expression threw; the previous render stays.
    Evaluate,
    /// A list could not be reconciled as asked.
    Reconcile,
    /// A marker was present but could not take effect.
    Classify,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Compile => "compile",
            Self::Evaluate => "evaluate",
            Self::Reconcile => "reconcile",
            Self::Classify => "classify",
        })
    }
}

/// A recoverable problem the engine reported instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub node: NodeId,
    pub marker: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        node: NodeId,
        marker: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            node,
            marker: marker.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}] {} data-{}: {}",
            self.kind,
            self.node,
            attribute_suffix(&self.marker),
            self.message
        )
    }
}

/// `propTextContent` -> `prop-text-content`
fn attribute_suffix(marker: &str) -> String {
    let mut suffix = String::with_capacity(marker.len() + 4);
    for character in marker.chars() {
        if character.is_ascii_uppercase() {
            suffix.push('-');
            suffix.push(character.to_ascii_lowercase());
        } else {
            suffix.push(character);
        }
    }
    suffix
}

/// Most recent diagnostics, at most `limit` of them. Older records are
/// dropped first and only counted.
#[derive(Debug)]
pub(crate) struct Diagnostics {
    records: Vec<Diagnostic>,
    limit: usize,
    dropped: usize,
}

impl Diagnostics {
    pub fn new(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        if self.limit == 0 {
            self.dropped += 1;
            return;
        }
        if self.records.len() >= self.limit {
            self.records.remove(0);
            self.dropped += 1;
        }
        self.records.push(diagnostic);
    }

    /// Records discarded to stay within the limit since the last `take`.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.dropped = 0;
        std::mem::take(&mut self.records)
    }
}
