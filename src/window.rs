use core::f64::consts::PI;

use crate::sinc::FilterSpec;

/// Builds the one sided coefficient table of a Kaiser windowed sinc low pass filter.
///
/// The table holds `half_len + 2` coefficients sampled `increment` times per input sample.
/// Coefficient `i` belongs to the distance `i / increment` input samples from the filter
/// center. Coefficients from `half_len` on are set to zero, so the two trailing guard
/// coefficients are zero and linear interpolation between neighbours never leaves the table.
///
/// The table is normalized to unity gain at DC: the center coefficient plus twice the sum of
/// all coefficients on integer sample distances equals one.
pub(crate) fn make_sinc_table(spec: &FilterSpec) -> Vec<f32> {
    let half_len = spec.half_len;
    let increment = spec.increment as f64;
    let bessel_beta = bessel_i0(spec.beta);

    let sinc = |value: f64| -> f64 {
        match value == 0.0 {
            true => 1.0,
            false => (value * PI).sin() / (value * PI),
        }
    };

    let coeffs: Vec<f64> = (0..half_len + 2)
        .map(|index| {
            if index >= half_len {
                return 0.0;
            }
            let window = kaiser(index as f64 / half_len as f64, spec.beta, bessel_beta);
            spec.cutoff * sinc(spec.cutoff * index as f64 / increment) * window
        })
        .collect();

    let dc_gain = coeffs[0]
        + 2.0
            * coeffs
                .iter()
                .step_by(spec.increment)
                .skip(1)
                .sum::<f64>();

    coeffs
        .into_iter()
        .map(|coeff| (coeff / dc_gain) as f32)
        .collect()
}

/// Kaiser window at the normalized distance `x` from its center, `x ∈ [-1, 1]`.
///
/// `bessel_beta` is `I₀(beta)`, passed in so tables can compute it once.
fn kaiser(x: f64, beta: f64, bessel_beta: f64) -> f64 {
    let radicand = (1.0 - x * x).max(0.0);
    bessel_i0(beta * radicand.sqrt()) / bessel_beta
}

/// Modified Bessel function of the first kind, order zero (I₀).
fn bessel_i0(x: f64) -> f64 {
    let base = x * x / 4.0;

    let mut term = 1.0;
    let mut result = 1.0;

    for idx in 1..1500 {
        term = term * base / (idx * idx) as f64;
        let previous = result;
        result += term;
        if result == previous {
            break;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual / expected - 1.0).abs() < tolerance,
            "Expected {expected}, got {actual}"
        );
    }

    fn small_spec() -> FilterSpec {
        FilterSpec {
            half_len: 64 * 8,
            increment: 64,
            cutoff: 0.9,
            beta: 8.0,
        }
    }

    #[test]
    fn test_bessel_i0_known_values() {
        // Test against scipy.special.i0 reference values
        assert_approx(bessel_i0(0.0), 1.000000000000000, 1e-10);
        assert_approx(bessel_i0(1.0), 1.266065877752008, 1e-10);
        assert_approx(bessel_i0(2.0), 2.279585302336067, 1e-10);
        assert_approx(bessel_i0(5.0), 27.239871823604442, 1e-10);
        assert_approx(bessel_i0(10.0), 2815.716628466253951, 1e-10);
    }

    #[test]
    fn test_kaiser_beta_10() {
        // Right half of scipy.signal.windows.kaiser(9, 10.0, sym=True)
        let expected = [
            1.000000000000000,
            0.740117133443384,
            0.282059620822733,
            0.041939800327748,
            0.000355149374724,
        ];
        let bessel_beta = bessel_i0(10.0);

        for (index, &exp) in expected.iter().enumerate() {
            let x = index as f64 / 4.0;
            assert_approx(kaiser(x, 10.0, bessel_beta), exp, 1e-9);
            assert_approx(kaiser(-x, 10.0, bessel_beta), exp, 1e-9);
        }
    }

    #[test]
    fn test_kaiser_beta_5() {
        // Right half of scipy.signal.windows.kaiser(15, 5.0, sym=True)
        let expected = [
            1.000000000000000,
            0.955247316456437,
            0.830535847455841,
            0.651738235245363,
            0.453689854203301,
            0.270694417889417,
            0.127982199301765,
            0.036710892271287,
        ];
        let bessel_beta = bessel_i0(5.0);

        for (index, &exp) in expected.iter().enumerate() {
            assert_approx(kaiser(index as f64 / 7.0, 5.0, bessel_beta), exp, 1e-9);
        }
    }

    #[test]
    fn test_kaiser_edge_is_not_zero() {
        let bessel_beta = bessel_i0(8.0);
        assert_approx(kaiser(1.0, 8.0, bessel_beta), 1.0 / bessel_beta, 1e-12);
        assert!(kaiser(1.0, 8.0, bessel_beta) > 0.0);
    }

    #[test]
    fn test_sinc_table_shape() {
        let spec = small_spec();
        let table = make_sinc_table(&spec);

        assert_eq!(table.len(), spec.half_len + 2);
        assert_eq!(table[spec.half_len], 0.0);
        assert_eq!(table[spec.half_len + 1], 0.0);
        assert_ne!(table[spec.half_len - 1], 0.0);

        let peak = table.iter().copied().fold(f32::MIN, f32::max);
        assert_eq!(peak, table[0], "The center coefficient must be the largest");
    }

    #[test]
    fn test_sinc_table_unity_dc_gain() {
        let spec = small_spec();
        let table = make_sinc_table(&spec);

        let gain = table[0] as f64
            + 2.0
                * table
                    .iter()
                    .step_by(spec.increment)
                    .skip(1)
                    .map(|&coeff| coeff as f64)
                    .sum::<f64>();
        assert!((gain - 1.0).abs() < 1e-6, "DC gain should be 1, got {gain}");
    }

    #[test]
    fn test_sinc_table_zero_crossings() {
        // A cutoff of 1.0 places the sinc zeros on integer sample distances.
        let spec = FilterSpec {
            cutoff: 1.0,
            ..small_spec()
        };
        let table = make_sinc_table(&spec);

        assert!((table[0] - 1.0).abs() < 1e-6);
        for crossing in 1..8 {
            let coeff = table[crossing * spec.increment];
            assert!(
                coeff.abs() < 1e-6,
                "Coefficient at crossing {crossing} should vanish, got {coeff}"
            );
        }
    }
}
