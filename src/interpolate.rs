//! Catmull-Rom trajectory interpolation.
//!
//! Deformation and motion-line generation both go through [`catmull_rom`] so
//! they reconstruct identical positions between sampled frames.

use glam::DVec3;

/// Catmull-Rom basis weights at parameter `t`.
#[inline]
pub fn catmull_rom_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

/// Interpolate between `p1` (t = 0) and `p2` (t = 1).
#[inline]
pub fn catmull_rom(p0: DVec3, p1: DVec3, p2: DVec3, p3: DVec3, t: f64) -> DVec3 {
    let [a0, a1, a2, a3] = catmull_rom_weights(t);
    p0 * a0 + p1 * a1 + p2 * a2 + p3 * a3
}

/// Control rows `base - 1 ..= base + 2`, each clamped into `0..frame_count`.
///
/// `frame_count` must be non-zero.
pub fn clamped_control_frames(base: i64, frame_count: usize) -> [usize; 4] {
    let last = frame_count.saturating_sub(1) as i64;
    [base - 1, base, base + 1, base + 2].map(|f| f.clamp(0, last) as usize)
}

/// Position on a vertex trajectory at fractional row `position`.
///
/// `lookup` returns the vertex position at a row index. `None` for an empty trajectory.
pub fn sample_trajectory<F>(frame_count: usize, position: f64, lookup: F) -> Option<DVec3>
where
    F: Fn(usize) -> Option<DVec3>,
{
    if frame_count == 0 {
        return None;
    }
    let base = position.floor();
    let t = position - base;
    let [i0, i1, i2, i3] = clamped_control_frames(base as i64, frame_count);
    Some(catmull_rom(lookup(i0)?, lookup(i1)?, lookup(i2)?, lookup(i3)?, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_endpoints_exact() {
        let tuples = [
            (DVec3::new(-1.0, 2.0, 3.0), DVec3::new(0.5, -4.0, 1.0), DVec3::new(9.0, 9.0, -9.0), DVec3::ZERO),
            (DVec3::splat(100.0), DVec3::splat(-3.25), DVec3::new(0.1, 0.2, 0.3), DVec3::splat(7.0)),
        ];
        for (p0, p1, p2, p3) in tuples {
            assert!((catmull_rom(p0, p1, p2, p3, 0.0) - p1).length() < EPSILON);
            assert!((catmull_rom(p0, p1, p2, p3, 1.0) - p2).length() < EPSILON);
        }
    }

    #[test]
    fn test_midpoint_bounded() {
        let p = catmull_rom(
            DVec3::new(-10.0, 0.0, 0.0),
            DVec3::ZERO,
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(20.0, 0.0, 0.0),
            0.5,
        );
        assert!(p.x > 0.0 && p.x < 10.0);
        assert!((p.x - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_weights_sum_to_one() {
        for i in 0..=10 {
            let t = f64::from(i) / 10.0;
            let sum: f64 = catmull_rom_weights(t).iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_control_frames_clamped() {
        assert_eq!(clamped_control_frames(0, 5), [0, 0, 1, 2]);
        assert_eq!(clamped_control_frames(4, 5), [3, 4, 4, 4]);
        assert_eq!(clamped_control_frames(-3, 5), [0, 0, 0, 0]);
        assert_eq!(clamped_control_frames(2, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn test_sample_trajectory_linear_motion() {
        let rows: Vec<DVec3> = (0..6).map(|i| DVec3::new(f64::from(i), 0.0, 0.0)).collect();
        let p = sample_trajectory(rows.len(), 2.25, |i| rows.get(i).copied()).unwrap();
        assert!((p.x - 2.25).abs() < EPSILON);
        assert!(sample_trajectory(0, 1.0, |_| None).is_none());
    }
}
