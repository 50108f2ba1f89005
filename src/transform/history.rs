//! Linear undo/redo history.
//!
//! Two unbounded stacks. Pushing a new entry clears the redo stack.

type Step = Box<dyn FnMut() + Send>;

/// One committed edit with closures restoring either side of it.
pub struct HistoryEntry {
    pub label: String,
    undo: Step,
    redo: Step,
}

impl HistoryEntry {
    pub fn new(
        label: impl Into<String>,
        undo: impl FnMut() + Send + 'static,
        redo: impl FnMut() + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            undo: Box::new(undo),
            redo: Box::new(redo),
        }
    }
}

impl std::fmt::Debug for HistoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEntry").field("label", &self.label).finish()
    }
}

#[derive(Debug, Default)]
pub struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edit that has already been applied.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.undo.push(entry);
    }

    /// Undo the latest edit. Returns its label, or `None` when empty.
    pub fn undo(&mut self) -> Option<String> {
        let mut entry = self.undo.pop()?;
        (entry.undo)();
        let label = entry.label.clone();
        self.redo.push(entry);
        Some(label)
    }

    /// Redo the latest undone edit.
    pub fn redo(&mut self) -> Option<String> {
        let mut entry = self.redo.pop()?;
        (entry.redo)();
        let label = entry.label.clone();
        self.undo.push(entry);
        Some(label)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Labels of undoable entries, oldest first.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.undo.iter().map(|e| e.label.as_str())
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
