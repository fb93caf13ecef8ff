//! AVX and AVX+FMA optimized dot products.

use core::arch::x86_64::*;

use super::convolve_scalar;

const SIMD_WIDTH: usize = 8;

/// AVX+FMA implementation of the dot product.
///
/// Processes 8 taps per iteration with fused multiply-add, the remainder with scalar code.
/// Both slices must have the same length.
#[cfg(target_feature = "fma")]
#[target_feature(enable = "avx,fma")]
pub(super) unsafe fn convolve_avx_fma(input: &[f32], coeffs: &[f32]) -> f32 {
    unsafe {
        let taps = input.len();
        let simd_iterations = taps / SIMD_WIDTH;

        let mut acc = _mm256_setzero_ps();

        for i in 0..simd_iterations {
            let offset = i * SIMD_WIDTH;

            let input_vec = _mm256_loadu_ps(input.as_ptr().add(offset));
            let coeffs_vec = _mm256_loadu_ps(coeffs.as_ptr().add(offset));

            acc = _mm256_fmadd_ps(coeffs_vec, input_vec, acc);
        }

        let tail = simd_iterations * SIMD_WIDTH;
        horizontal_sum(acc) + convolve_scalar(&input[tail..], &coeffs[tail..])
    }
}

/// AVX implementation of the dot product for targets without FMA.
#[cfg(not(target_feature = "fma"))]
#[target_feature(enable = "avx")]
pub(super) unsafe fn convolve_avx(input: &[f32], coeffs: &[f32]) -> f32 {
    unsafe {
        let taps = input.len();
        let simd_iterations = taps / SIMD_WIDTH;

        let mut acc = _mm256_setzero_ps();

        for i in 0..simd_iterations {
            let offset = i * SIMD_WIDTH;

            let input_vec = _mm256_loadu_ps(input.as_ptr().add(offset));
            let coeffs_vec = _mm256_loadu_ps(coeffs.as_ptr().add(offset));

            acc = _mm256_add_ps(acc, _mm256_mul_ps(coeffs_vec, input_vec));
        }

        let tail = simd_iterations * SIMD_WIDTH;
        horizontal_sum(acc) + convolve_scalar(&input[tail..], &coeffs[tail..])
    }
}

#[inline(always)]
unsafe fn horizontal_sum(acc: __m256) -> f32 {
    unsafe {
        // Step 1: Add the high and low 128-bit lanes.
        let high = _mm256_extractf128_ps(acc, 1);
        let low = _mm256_castps256_ps128(acc);
        let sum128 = _mm_add_ps(high, low);

        // Step 2: Horizontal sum within the 128-bit vector using shuffles.
        let shuf = _mm_shuffle_ps(sum128, sum128, 0b01_00_11_10);
        let sum1 = _mm_add_ps(sum128, shuf);
        let shuf2 = _mm_shuffle_ps(sum1, sum1, 0b00_00_00_01);
        let sum2 = _mm_add_ps(sum1, shuf2);
        _mm_cvtss_f32(sum2)
    }
}
