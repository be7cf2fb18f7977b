// Drop gesture coalescing
//
// winit reports a multi-file drop as one DroppedFile event per file. Only the
// first file of a gesture becomes a conversion request; the rest are dropped
// here so the controller never sees them as competing requests.

use std::path::PathBuf;

/// Tracks which files of the current drag-and-drop gesture were accepted.
///
/// The shell calls [`begin`](Self::begin) when a drag enters the window,
/// [`offer`](Self::offer) for each dropped file, and [`end`](Self::end) once
/// the event batch carrying the drop has been handled.
#[derive(Debug, Default)]
pub struct DropGesture {
    accepted: bool,
    ignored: usize,
}

impl DropGesture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new drag entered the window
    pub fn begin(&mut self) {
        self.accepted = false;
        self.ignored = 0;
    }

    /// Offer one dropped file.
    ///
    /// # Returns
    /// The path if it is the first file of the gesture, `None` otherwise
    pub fn offer(&mut self, path: PathBuf) -> Option<PathBuf> {
        if self.accepted {
            tracing::debug!("Ignoring extra dropped file: {}", path.display());
            self.ignored += 1;
            None
        } else {
            self.accepted = true;
            Some(path)
        }
    }

    /// Close the gesture
    ///
    /// # Returns
    /// How many files were ignored
    pub fn end(&mut self) -> usize {
        let ignored = self.ignored;
        self.begin();
        ignored
    }

    /// Whether a file was already accepted in this gesture
    pub fn is_open(&self) -> bool {
        self.accepted
    }
}
