use crate::domain::{ImageData, ViewMode};

/// Outcome of a requested view change.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// Left unchanged; After and Overlay need a result to show.
    Rejected,
}

/// The current source/result pair and how it is displayed.
///
/// Starts in `Before` with nothing loaded. `After` and `Overlay` are only
/// reachable while a result exists.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    mode: ViewMode,
    original: Option<ImageData>,
    result: Option<ImageData>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn original(&self) -> Option<&ImageData> {
        self.original.as_ref()
    }

    pub fn result(&self) -> Option<&ImageData> {
        self.result.as_ref()
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// A new upload: discard any result and go back to `Before`.
    pub fn upload(&mut self, image: ImageData) {
        self.original = Some(image);
        self.result = None;
        self.mode = ViewMode::Before;
    }

    /// A correction finished; show its result.
    pub fn show_result(&mut self, result: ImageData) {
        self.result = Some(result);
        self.mode = ViewMode::After;
    }

    /// Load a recorded original/result pair, shown as `After`.
    pub fn restore(&mut self, original: ImageData, result: ImageData) {
        self.original = Some(original);
        self.show_result(result);
    }

    pub fn request(&mut self, mode: ViewMode) -> Transition {
        match mode {
            ViewMode::Before => {
                self.mode = ViewMode::Before;
                Transition::Applied
            }
            ViewMode::After | ViewMode::Overlay if self.result.is_some() => {
                self.mode = mode;
                Transition::Applied
            }
            ViewMode::After | ViewMode::Overlay => Transition::Rejected,
        }
    }

    /// Make the current result the new source and start the cycle again.
    /// Returns the new source, or None (and changes nothing) without a result.
    pub fn promote(&mut self) -> Option<&ImageData> {
        let result = self.result.take()?;
        self.original = Some(result);
        self.mode = ViewMode::Before;
        self.original.as_ref()
    }
}
