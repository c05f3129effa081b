//! Temporal smoothing of motion offsets.
//!
//! A symmetric window of `2N + 1` frames weighted by the smooth-step-squared
//! kernel `(1 - (|n| / (N + 1))^2)^2`. Frames outside the table are skipped.

/// Kernel weight of a neighbour `n` frames away in a half-window of `window`.
pub fn kernel_weight(n: i64, window: usize) -> f64 {
    let x = n.unsigned_abs() as f64 / (window as f64 + 1.0);
    let w = 1.0 - x * x;
    w * w
}

/// Smoothed offset of a single vertex at `frame_index`.
///
/// Returns `None` when the frame or vertex is not in the table.
pub fn smooth_vertex_offset(
    offsets: &[Vec<f64>],
    frame_index: usize,
    vertex: usize,
    window: usize,
    enabled: bool,
) -> Option<f64> {
    let raw = *offsets.get(frame_index)?.get(vertex)?;
    if !enabled || window == 0 {
        return Some(raw);
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let radius = window as i64;
    for n in -radius..=radius {
        let neighbour = frame_index as i64 + n;
        if neighbour < 0 {
            continue;
        }
        let Some(value) = offsets.get(neighbour as usize).and_then(|row| row.get(vertex)) else {
            continue;
        };
        let weight = kernel_weight(n, window);
        weighted_sum += value * weight;
        weight_total += weight;
    }

    if weight_total > 0.0 {
        Some(weighted_sum / weight_total)
    } else {
        Some(raw)
    }
}

/// Smoothed offsets of every vertex at `frame_index`.
///
/// Disabled smoothing or a zero window returns the raw row unchanged.
pub fn smooth_offsets(offsets: &[Vec<f64>], frame_index: usize, window: usize, enabled: bool) -> Option<Vec<f64>> {
    let row = offsets.get(frame_index)?;
    if !enabled || window == 0 {
        return Some(row.clone());
    }
    (0..row.len())
        .map(|v| smooth_vertex_offset(offsets, frame_index, v, window, enabled))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 1.0],
            vec![1.0, -1.0],
            vec![0.0, 1.0],
            vec![1.0, -1.0],
            vec![0.3, 0.7],
        ]
    }

    #[test]
    fn test_passthrough_when_disabled_or_zero_window() {
        let offsets = table();
        for frame in 0..offsets.len() {
            assert_eq!(smooth_offsets(&offsets, frame, 0, true).unwrap(), offsets[frame]);
            assert_eq!(smooth_offsets(&offsets, frame, 3, false).unwrap(), offsets[frame]);
        }
    }

    #[test]
    fn test_kernel_weights() {
        assert_eq!(kernel_weight(0, 2), 1.0);
        assert!((kernel_weight(1, 1) - 0.5625).abs() < 1e-12);
        assert!(kernel_weight(2, 2) < kernel_weight(1, 2));
    }

    #[test]
    fn test_window_one_interior() {
        let offsets = table();
        // Neighbours weigh 0.5625 each, centre 1.0.
        let expected = (0.0 * 0.5625 + 1.0 + 0.0 * 0.5625) / (1.0 + 2.0 * 0.5625);
        let smoothed = smooth_offsets(&offsets, 1, 1, true).unwrap();
        assert!((smoothed[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_edges_skip_missing_frames() {
        let offsets = table();
        let expected = (0.0 + 1.0 * 0.5625) / 1.5625;
        let smoothed = smooth_vertex_offset(&offsets, 0, 0, 1, true).unwrap();
        assert!((smoothed - expected).abs() < 1e-12);
    }

    #[test]
    fn test_smoothing_reduces_jitter() {
        let offsets = table();
        let smoothed = smooth_offsets(&offsets, 2, 2, true).unwrap();
        assert!(smoothed[1].abs() < 1.0);
    }

    #[test]
    fn test_out_of_range_frame() {
        assert!(smooth_offsets(&table(), 9, 1, true).is_none());
    }
}
