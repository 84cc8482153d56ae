// src/stage/frame.rs
// Frame accumulation controller: decides reset / continue / freeze from
// the collected change flags and the optional frame-count limit.

/// What a frame call is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    /// Scene changed: frame counter back to 0, full clear before tracing.
    Reset,
    /// No change: blend one more sample into the running image.
    Accumulating,
    /// Frame limit reached: no buffer mutation, no dispatch.
    Frozen,
}

#[derive(Debug, Default)]
pub struct FrameControl {
    counter: u32,
}

impl FrameControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Advance the frame counter and resolve the phase. `frame_limit < 0`
    /// means unlimited. A scene change always resets the counter, so a
    /// change can thaw a frozen stage; the frozen check still precedes any
    /// GPU work in the caller.
    pub fn advance(&mut self, scene_changed: bool, frame_limit: i32) -> FramePhase {
        if scene_changed {
            self.counter = 0;
        } else {
            self.counter = self.counter.saturating_add(1);
        }

        if frame_limit >= 0 && self.counter >= frame_limit as u32 {
            FramePhase::Frozen
        } else if scene_changed {
            FramePhase::Reset
        } else {
            FramePhase::Accumulating
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_resets_counter() {
        let mut control = FrameControl::new();
        assert_eq!(control.advance(true, -1), FramePhase::Reset);
        assert_eq!(control.advance(false, -1), FramePhase::Accumulating);
        assert_eq!(control.advance(false, -1), FramePhase::Accumulating);
        assert_eq!(control.counter(), 2);
        assert_eq!(control.advance(true, -1), FramePhase::Reset);
        assert_eq!(control.counter(), 0);
    }

    #[test]
    fn limit_freezes_after_counted_frames() {
        let mut control = FrameControl::new();
        control.advance(true, 3);
        control.advance(false, 3);
        control.advance(false, 3);
        // counter is now 2; the next unchanged frame reaches the limit
        assert_eq!(control.advance(false, 3), FramePhase::Frozen);
        assert_eq!(control.advance(false, 3), FramePhase::Frozen);
    }

    #[test]
    fn zero_limit_never_renders() {
        let mut control = FrameControl::new();
        assert_eq!(control.advance(true, 0), FramePhase::Frozen);
        assert_eq!(control.advance(false, 0), FramePhase::Frozen);
    }

    #[test]
    fn change_thaws_a_frozen_stage() {
        let mut control = FrameControl::new();
        control.advance(true, 1);
        assert_eq!(control.advance(false, 1), FramePhase::Frozen);
        assert_eq!(control.advance(true, 1), FramePhase::Reset);
    }
}
