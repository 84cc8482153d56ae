// Coarse sampling order properties: full coverage without repeats, the
// documented refinement prefix, and window clamping for non-power-of-two
// sizes.

use glam::UVec2;
use glint::coarse_sampling_order;

#[test]
fn covers_every_pixel_exactly_once() {
    for w in 1u32..=64 {
        let order = coarse_sampling_order(w);
        assert_eq!(order.len(), (w * w) as usize, "window size {}", w);

        let mut seen = vec![false; (w * w) as usize];
        for win in &order {
            assert!(win.origin.x < w && win.origin.y < w);
            let idx = (win.origin.y * w + win.origin.x) as usize;
            assert!(!seen[idx], "origin repeated at w={}", w);
            seen[idx] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}

#[test]
fn first_window_spans_the_whole_region() {
    for w in [1u32, 2, 3, 4, 7, 16, 33] {
        let order = coarse_sampling_order(w);
        assert_eq!(order[0].origin, UVec2::ZERO);
        assert_eq!(order[0].size, UVec2::splat(w));
    }
}

#[test]
fn refinement_order_for_a_four_pixel_window() {
    let order = coarse_sampling_order(4);
    let origins: Vec<(u32, u32)> = order.iter().map(|w| (w.origin.x, w.origin.y)).collect();
    assert_eq!(
        origins,
        vec![
            (0, 0),
            (2, 2),
            (2, 0),
            (0, 2),
            (1, 1),
            (1, 0),
            (0, 1),
            (3, 3),
            (3, 2),
            (2, 3),
            (3, 1),
            (3, 0),
            (2, 1),
            (1, 3),
            (1, 2),
            (0, 3),
        ]
    );
}

#[test]
fn window_sizes_are_clamped_to_the_region() {
    // 3 rounds up to 4 internally; no window may reach past 3x3
    for win in coarse_sampling_order(3) {
        assert!(win.origin.x + win.size.x <= 3);
        assert!(win.origin.y + win.size.y <= 3);
        assert!(win.size.x >= 1 && win.size.y >= 1);
    }
}

#[test]
fn coarser_windows_come_first() {
    let order = coarse_sampling_order(8);
    let mut last_area = u32::MAX;
    let mut areas: Vec<u32> = order.iter().map(|w| w.size.x * w.size.y).collect();
    // areas never grow between refinement levels
    for area in areas.drain(..) {
        assert!(area <= last_area || area == 1);
        last_area = last_area.min(area);
    }
}
