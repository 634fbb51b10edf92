//! Code fence tracking for the line pass.
//!
//! Lines inside fenced code blocks are opaque: directive markers there are
//! literal text.

/// Open code fence: its character and marker length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenFence {
    ch: char,
    len: usize,
}

/// Tracks whether the line pass is inside a fenced code block.
///
/// A fence opens with three or more backticks or tildes and closes on a line
/// of the same character, at least as long, with nothing after it.
#[derive(Debug, Default)]
pub(crate) struct FenceTracker {
    open: Option<OpenFence>,
}

impl FenceTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn in_fence(&self) -> bool {
        self.open.is_some()
    }

    /// Feed one line. Returns `true` when the line opened or closed a fence.
    pub(crate) fn update(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self.open {
            Some(fence) => {
                let closes = marker_len(trimmed, fence.ch).is_some_and(|len| {
                    len >= fence.len && trimmed[len..].trim().is_empty()
                });
                if closes {
                    self.open = None;
                }
                closes
            }
            None => {
                let opened = ['`', '~'].into_iter().find_map(|ch| {
                    marker_len(trimmed, ch).map(|len| OpenFence { ch, len })
                });
                self.open = opened;
                opened.is_some()
            }
        }
    }
}

/// Length of a run of at least three `ch` at the start of `s`.
fn marker_len(s: &str, ch: char) -> Option<usize> {
    let len = s.chars().take_while(|&c| c == ch).count();
    (len >= 3).then_some(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_inside_fence_are_opaque() {
        let mut tracker = FenceTracker::new();
        assert!(tracker.update("```markdown"));
        assert!(!tracker.update(":::if[x]"));
        assert!(tracker.in_fence());
        assert!(tracker.update("```"));
        assert!(!tracker.in_fence());
    }

    #[test]
    fn test_close_needs_same_char_and_length() {
        let mut tracker = FenceTracker::new();
        tracker.update("~~~~");
        assert!(!tracker.update("```"));
        assert!(!tracker.update("~~~"));
        assert!(!tracker.update("~~~~ trailing"));
        assert!(tracker.update("  ~~~~~"));
        assert!(!tracker.in_fence());
    }

    #[test]
    fn test_short_runs_are_not_fences() {
        let mut tracker = FenceTracker::new();
        assert!(!tracker.update("``code``"));
        assert!(!tracker.update(":::"));
        assert!(!tracker.in_fence());
    }
}
