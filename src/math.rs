// src/math.rs
// Integer helpers and the dynamic ray-dispatch sizing formula.
// Kept as pure functions so the sizing contract stays unit-testable.

use glam::UVec3;

/// Round `n` up to the next multiple of `k`. `k` must be non-zero.
#[inline]
pub fn next_multiple(n: u64, k: u64) -> u64 {
    n + (k - n % k) % k
}

#[inline]
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    loop {
        if a == 0 {
            return b;
        }
        b %= a;
        if b == 0 {
            return a;
        }
        a %= b;
    }
}

#[inline]
pub fn lcm(a: u64, b: u64) -> u64 {
    let g = gcd(a, b);
    if g == 0 {
        0
    } else {
        a / g * b
    }
}

#[inline]
pub fn ceil_div(n: u32, k: u32) -> u32 {
    (n + k - 1) / k
}

/// Work-group geometry for a dispatch of `num_rays` dynamically queued items.
///
/// `stride_x = next_multiple(ceil(sqrt(n)), group)` and
/// `stride_y = next_multiple(ceil(n / stride_x), group)` give every queued
/// item a unique row-major 2D slot while bounding idle threads to less than
/// one extra row/column. Returns the dispatch grid and the row stride the
/// shader needs for slot addressing. `num_rays == 0` yields a `(0, 0, 1)`
/// grid, which dispatches nothing.
pub fn ray_dispatch_extent(num_rays: u32, group: u32) -> (UVec3, u32) {
    if num_rays == 0 {
        return (UVec3::new(0, 0, 1), 0);
    }

    let stride_x = next_multiple((num_rays as f32).sqrt().ceil() as u64, group as u64) as u32;
    let stride_y = next_multiple(
        (num_rays as f32 / stride_x as f32).ceil() as u64,
        group as u64,
    ) as u32;

    (
        UVec3::new(stride_x / group, stride_y / group, 1),
        stride_x,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_multiple_basics() {
        assert_eq!(next_multiple(0, 16), 0);
        assert_eq!(next_multiple(1, 16), 16);
        assert_eq!(next_multiple(16, 16), 16);
        assert_eq!(next_multiple(17, 16), 32);
    }

    #[test]
    fn lcm_of_alignment_and_entry() {
        assert_eq!(lcm(256, 32), 256);
        assert_eq!(lcm(48, 32), 96);
        assert_eq!(lcm(0, 32), 0);
    }

    #[test]
    fn zero_rays_dispatch_nothing() {
        let (grid, stride) = ray_dispatch_extent(0, 16);
        assert_eq!(grid, UVec3::new(0, 0, 1));
        assert_eq!(stride, 0);
    }

    #[test]
    fn seventeen_rays_fit_one_group() {
        // ceil(sqrt(17)) = 5 -> stride_x 16; ceil(17/16) = 2 -> stride_y 16
        let (grid, stride) = ray_dispatch_extent(17, 16);
        assert_eq!(grid, UVec3::new(1, 1, 1));
        assert_eq!(stride, 16);
    }

    #[test]
    fn every_ray_gets_a_slot() {
        for n in [1u32, 15, 16, 255, 256, 1000, 65536] {
            let (grid, stride) = ray_dispatch_extent(n, 16);
            let threads = (grid.x * 16) * (grid.y * 16);
            assert!(threads >= n, "n={n}: {threads} threads < {n} rays");
            assert_eq!(grid.x * 16, stride);
        }
    }
}
