// Accumulation phase transitions as a host would drive them: resets on
// scene changes, freezing at the frame limit, thawing on change.

use glint::stage::frame::{FrameControl, FramePhase};

#[test]
fn accumulates_until_the_limit_then_freezes() {
    let mut frame = FrameControl::new();
    assert_eq!(frame.advance(true, 3), FramePhase::Reset);
    assert_eq!(frame.advance(false, 3), FramePhase::Accumulating);
    assert_eq!(frame.advance(false, 3), FramePhase::Accumulating);
    assert_eq!(frame.advance(false, 3), FramePhase::Frozen);
    assert_eq!(frame.advance(false, 3), FramePhase::Frozen);
}

#[test]
fn a_change_thaws_a_frozen_image() {
    let mut frame = FrameControl::new();
    frame.advance(true, 1);
    assert_eq!(frame.advance(false, 1), FramePhase::Frozen);
    assert_eq!(frame.advance(true, 1), FramePhase::Reset);
    assert_eq!(frame.counter(), 0);
}

#[test]
fn negative_limit_never_freezes() {
    let mut frame = FrameControl::new();
    frame.advance(true, -1);
    for _ in 0..1000 {
        assert_eq!(frame.advance(false, -1), FramePhase::Accumulating);
    }
}

#[test]
fn zero_limit_freezes_immediately() {
    let mut frame = FrameControl::new();
    assert_eq!(frame.advance(true, 0), FramePhase::Frozen);
}
