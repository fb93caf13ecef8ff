//! SSE and SSE3 optimized dot products.

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

use super::convolve_scalar;

const SIMD_WIDTH: usize = 4;

/// SSE implementation of the dot product.
///
/// Uses 128-bit SIMD registers to process 4 f32 values at a time, the remainder with scalar
/// code. Both slices must have the same length.
#[cfg(all(
    target_arch = "x86_64",
    target_feature = "sse",
    not(target_feature = "sse3"),
    not(target_feature = "avx")
))]
#[target_feature(enable = "sse")]
pub(super) unsafe fn convolve_sse(input: &[f32], coeffs: &[f32]) -> f32 {
    unsafe {
        let taps = input.len();
        let simd_iterations = taps / SIMD_WIDTH;

        let mut acc = _mm_setzero_ps();

        for i in 0..simd_iterations {
            let offset = i * SIMD_WIDTH;

            let input_vec = _mm_loadu_ps(input.as_ptr().add(offset));
            let coeffs_vec = _mm_loadu_ps(coeffs.as_ptr().add(offset));

            acc = _mm_add_ps(acc, _mm_mul_ps(coeffs_vec, input_vec));
        }

        // SSE doesn't have hadd, so we manually shuffle and add.
        let shuf = _mm_shuffle_ps(acc, acc, 0b01_00_11_10); // [a2, a3, a0, a1]
        let sum1 = _mm_add_ps(acc, shuf); // [a0+a2, a1+a3, a2+a0, a3+a1]
        let shuf2 = _mm_shuffle_ps(sum1, sum1, 0b00_00_00_01); // [a1+a3, ...]
        let sum2 = _mm_add_ps(sum1, shuf2); // [a0+a2+a1+a3, ...]

        let tail = simd_iterations * SIMD_WIDTH;
        _mm_cvtss_f32(sum2) + convolve_scalar(&input[tail..], &coeffs[tail..])
    }
}

/// SSE3 implementation of the dot product.
#[cfg(all(
    target_arch = "x86_64",
    target_feature = "sse3",
    not(target_feature = "avx")
))]
#[target_feature(enable = "sse3")]
pub(super) unsafe fn convolve_sse3(input: &[f32], coeffs: &[f32]) -> f32 {
    unsafe {
        let taps = input.len();
        let simd_iterations = taps / SIMD_WIDTH;

        let mut acc = _mm_setzero_ps();

        for i in 0..simd_iterations {
            let offset = i * SIMD_WIDTH;

            let input_vec = _mm_loadu_ps(input.as_ptr().add(offset));
            let coeffs_vec = _mm_loadu_ps(coeffs.as_ptr().add(offset));

            acc = _mm_add_ps(acc, _mm_mul_ps(coeffs_vec, input_vec));
        }

        // Step 1: Add pairs: [a0+a1, a2+a3, a0+a1, a2+a3].
        let sum1 = _mm_hadd_ps(acc, acc);
        // Step 2: Add pairs again: [a0+a1+a2+a3, ...].
        let sum2 = _mm_hadd_ps(sum1, sum1);

        let tail = simd_iterations * SIMD_WIDTH;
        _mm_cvtss_f32(sum2) + convolve_scalar(&input[tail..], &coeffs[tail..])
    }
}
