//! Turn-tracked caption state for model speech transcription.
//!
//! The remote side streams transcript deltas during a turn and signals the
//! turn boundary separately. A delta arriving after `turnComplete` starts a
//! fresh caption instead of appending; an interruption clears everything.

#[derive(Debug, Default)]
pub struct Transcript {
    caption: String,
    turn_complete: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transcription delta, or replace the caption when the
    /// previous turn has completed.
    pub fn apply_delta(&mut self, text: &str) {
        if self.turn_complete {
            self.caption.clear();
            self.caption.push_str(text);
            self.turn_complete = false;
        } else {
            self.caption.push_str(text);
        }
    }

    /// The remote side finished its turn; the next delta starts fresh.
    pub fn complete_turn(&mut self) {
        self.turn_complete = true;
    }

    /// The user barged in; drop the caption immediately.
    pub fn interrupt(&mut self) {
        self.caption.clear();
        self.turn_complete = false;
    }

    pub fn clear(&mut self) {
        self.caption.clear();
        self.turn_complete = false;
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_accumulate_within_a_turn() {
        let mut t = Transcript::new();
        t.apply_delta("Hi");
        t.apply_delta(" there");
        assert_eq!(t.caption(), "Hi there");
    }

    #[test]
    fn delta_after_turn_complete_replaces_caption() {
        let mut t = Transcript::new();
        t.apply_delta("Hi");
        t.apply_delta(" there");
        t.complete_turn();
        assert_eq!(t.caption(), "Hi there", "caption holds until the next delta");
        t.apply_delta("Next");
        assert_eq!(t.caption(), "Next");
        t.apply_delta(" step");
        assert_eq!(t.caption(), "Next step");
    }

    #[test]
    fn interrupt_clears_caption_and_turn_tracking() {
        let mut t = Transcript::new();
        t.apply_delta("Let me explain");
        t.complete_turn();
        t.interrupt();
        assert_eq!(t.caption(), "");
        // After an interrupt a delta appends to the empty caption rather
        // than going through the replace path.
        t.apply_delta("Sure");
        assert_eq!(t.caption(), "Sure");
    }

    #[test]
    fn interrupt_on_empty_transcript_is_harmless() {
        let mut t = Transcript::new();
        t.interrupt();
        assert_eq!(t.caption(), "");
    }
}
