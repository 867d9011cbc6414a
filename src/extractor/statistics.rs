use ndarray::{Array1, Array2, Axis};

const DELTA_WINDOW: usize = 2;
const EPSILON: f32 = 1e-12;

pub(crate) fn array_from_vec2(data: &[Vec<f64>]) -> Array2<f32> {
    let rows = data.len();
    let cols = data.first().map_or(0, Vec::len);
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        data[r].get(c).copied().unwrap_or(0.0) as f32
    })
}

/// Regression deltas over +/- `DELTA_WINDOW` frames, edges clamped.
pub(crate) fn compute_deltas(input: &Array2<f32>) -> Array2<f32> {
    let frames = input.len_of(Axis(0));
    let coeffs = input.len_of(Axis(1));
    let mut output = Array2::zeros((frames, coeffs));
    if frames == 0 {
        return output;
    }
    let denominator = (2.0_f32
        * (1..=DELTA_WINDOW)
            .map(|n| (n * n) as f32)
            .sum::<f32>())
    .max(EPSILON);

    for t in 0..frames {
        let mut numerator = Array1::<f32>::zeros(coeffs);
        for n in 1..=DELTA_WINDOW {
            let prev = input.row(t.saturating_sub(n));
            let next = input.row((t + n).min(frames - 1));
            numerator.scaled_add(n as f32, &(&next - &prev));
        }
        output.row_mut(t).assign(&(numerator / denominator));
    }
    output
}

/// Per-column mean followed by per-column standard deviation.
pub(crate) fn mean_and_std(frames: &Array2<f32>) -> Vec<f32> {
    let coeffs = frames.len_of(Axis(1));
    let mean = frames
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(coeffs));
    let std = frames.std_axis(Axis(0), 0.0);
    mean.iter().chain(std.iter()).copied().collect()
}

pub(crate) fn column_mean(frames: &Array2<f32>) -> Vec<f32> {
    let coeffs = frames.len_of(Axis(1));
    frames
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(coeffs))
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn deltas_of_linear_ramp_are_constant_inside() {
        let ramp = Array2::from_shape_fn((7, 1), |(t, _)| t as f32);
        let deltas = compute_deltas(&ramp);
        assert!((deltas[[3, 0]] - 1.0).abs() < 1e-6);
        assert!(deltas[[0, 0]] < 1.0);
    }

    #[test]
    fn pools_mean_then_std() {
        let frames = array![[1.0_f32, 10.0], [3.0, 10.0]];
        assert_eq!(mean_and_std(&frames), vec![2.0, 10.0, 1.0, 0.0]);
        assert_eq!(column_mean(&frames), vec![2.0, 10.0]);
    }

    #[test]
    fn ragged_rows_are_zero_filled() {
        let data = vec![vec![1.0, 2.0], vec![3.0]];
        let matrix = array_from_vec2(&data);
        assert_eq!(matrix.shape(), &[2, 2]);
        assert_eq!(matrix[[1, 1]], 0.0);
    }
}
