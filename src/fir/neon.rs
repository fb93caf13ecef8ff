//! NEON optimized dot product for aarch64.

use core::arch::aarch64::*;

use super::convolve_scalar;

/// NEON implementation of the dot product. Both slices must have the same length.
#[target_feature(enable = "neon")]
pub(super) unsafe fn convolve_neon(input: &[f32], coeffs: &[f32]) -> f32 {
    unsafe {
        const SIMD_WIDTH: usize = 4;
        let taps = input.len();
        let simd_iterations = taps / SIMD_WIDTH;

        let mut acc = vdupq_n_f32(0.0);

        for i in 0..simd_iterations {
            let offset = i * SIMD_WIDTH;

            let input_vec = vld1q_f32(input.as_ptr().add(offset));
            let coeffs_vec = vld1q_f32(coeffs.as_ptr().add(offset));

            acc = vfmaq_f32(acc, coeffs_vec, input_vec);
        }

        let tail = simd_iterations * SIMD_WIDTH;
        vaddvq_f32(acc) + convolve_scalar(&input[tail..], &coeffs[tail..])
    }
}
