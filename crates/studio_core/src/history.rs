use crate::batch::EncodedAsset;

/// Linear undo/redo history for one displayed asset.
///
/// Both stacks are unbounded: undo depth equals the number of edits recorded
/// since the session opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditHistory {
    undo: Vec<EncodedAsset>,
    redo: Vec<EncodedAsset>,
    displayed: EncodedAsset,
}

impl EditHistory {
    pub fn new(displayed: EncodedAsset) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            displayed,
        }
    }

    pub fn displayed(&self) -> &EncodedAsset {
        &self.displayed
    }

    pub fn undo_stack(&self) -> &[EncodedAsset] {
        &self.undo
    }

    pub fn redo_stack(&self) -> &[EncodedAsset] {
        &self.redo
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Display `next` as a fresh edit. Invalidates the redo history.
    pub fn record(&mut self, next: EncodedAsset) {
        self.begin_edit();
        self.complete_edit(next);
    }

    /// Start an edit whose result arrives later: the displayed asset becomes
    /// undoable and the redo history is dropped.
    pub fn begin_edit(&mut self) {
        self.undo.push(self.displayed.clone());
        self.redo.clear();
    }

    /// Display the result of the edit started by [`Self::begin_edit`].
    pub fn complete_edit(&mut self, next: EncodedAsset) {
        self.displayed = next;
    }

    /// Drop the undo entry pushed by [`Self::begin_edit`]. The redo history stays cleared.
    pub fn abandon_edit(&mut self) {
        self.undo.pop();
    }

    /// Step back one edit. Returns the newly displayed asset, or `None` if there was nothing to undo.
    pub fn undo(&mut self) -> Option<&EncodedAsset> {
        let previous = self.undo.pop()?;
        let current = std::mem::replace(&mut self.displayed, previous);
        self.redo.push(current);
        Some(&self.displayed)
    }

    pub fn redo(&mut self) -> Option<&EncodedAsset> {
        let next = self.redo.pop()?;
        let current = std::mem::replace(&mut self.displayed, next);
        self.undo.push(current);
        Some(&self.displayed)
    }
}
