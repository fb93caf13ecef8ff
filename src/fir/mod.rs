#[cfg(all(target_arch = "x86_64", target_feature = "avx"))]
mod avx;

#[cfg(all(
    target_arch = "x86_64",
    target_feature = "sse",
    not(target_feature = "avx")
))]
mod sse;

#[cfg(target_arch = "aarch64")]
mod neon;

/// Scalar dot product, also used for the tails the SIMD kernels leave over.
#[inline(always)]
fn convolve_scalar(input: &[f32], coeffs: &[f32]) -> f32 {
    input
        .iter()
        .zip(coeffs)
        .fold(0.0f32, |sum, (&sample, &coeff)| sum + coeff * sample)
}

/// Dot product of `input` and `coeffs` over the length of the shorter slice.
///
/// Selects the implementation from the compile-time target features. Only one SIMD
/// implementation is compiled per target configuration:
///
/// - **AVX+FMA**: 8 f32 per iteration with fused multiply-add (x86_64)
/// - **AVX**: 8 f32 per iteration with separate multiply/add (x86_64, no FMA)
/// - **SSE3**: 4 f32 per iteration with hadd instruction (x86_64, no AVX)
/// - **SSE**: 4 f32 per iteration with manual shuffle (x86_64, no SSE3/AVX)
/// - **NEON**: 4 f32 per iteration with fused multiply-add (aarch64, always available)
/// - **Scalar**: Fallback for all other architectures
#[inline(always)]
pub(crate) fn convolve(input: &[f32], coeffs: &[f32]) -> f32 {
    let taps = input.len().min(coeffs.len());
    let input = &input[..taps];
    let coeffs = &coeffs[..taps];

    #[cfg(all(target_arch = "x86_64", target_feature = "avx", target_feature = "fma"))]
    {
        // Safety: avx and fma are enabled at compile time and both slices hold `taps` values.
        unsafe { avx::convolve_avx_fma(input, coeffs) }
    }

    #[cfg(all(
        target_arch = "x86_64",
        target_feature = "avx",
        not(target_feature = "fma")
    ))]
    {
        // Safety: avx is enabled at compile time and both slices hold `taps` values.
        unsafe { avx::convolve_avx(input, coeffs) }
    }

    #[cfg(all(
        target_arch = "x86_64",
        target_feature = "sse3",
        not(target_feature = "avx")
    ))]
    {
        // Safety: sse3 is enabled at compile time and both slices hold `taps` values.
        unsafe { sse::convolve_sse3(input, coeffs) }
    }

    #[cfg(all(
        target_arch = "x86_64",
        target_feature = "sse",
        not(target_feature = "sse3"),
        not(target_feature = "avx")
    ))]
    {
        // Safety: sse is enabled at compile time and both slices hold `taps` values.
        unsafe { sse::convolve_sse(input, coeffs) }
    }

    #[cfg(target_arch = "aarch64")]
    {
        // Safety: NEON is mandatory on aarch64 and both slices hold `taps` values.
        unsafe { neon::convolve_neon(input, coeffs) }
    }

    #[cfg(not(any(
        all(target_arch = "x86_64", target_feature = "sse"),
        target_arch = "aarch64"
    )))]
    convolve_scalar(input, coeffs)
}
