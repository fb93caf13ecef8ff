//! Conversion between `f32` samples and 16 or 32 bit integer PCM.

use crate::error::{Error, ErrorCode, Result};

const SHORT_SCALE: f32 = 32768.0;
const INT_SCALE: f64 = 2147483648.0;

fn check_lengths(input: usize, output: usize) -> Result<()> {
    match output < input {
        true => Err(Error::with_detail(
            ErrorCode::BadDataPtr,
            format!("input samples={input} output samples={output}"),
        )),
        false => Ok(()),
    }
}

/// Scales 16 bit samples to `[-1.0, 1.0)`.
pub fn short_to_float(input: &[i16], output: &mut [f32]) -> Result<()> {
    check_lengths(input.len(), output.len())?;
    for (out, &sample) in output.iter_mut().zip(input) {
        *out = sample as f32 / SHORT_SCALE;
    }
    Ok(())
}

/// Scales samples to 16 bit, rounding half to even and clipping values outside `[-1.0, 1.0)`.
pub fn float_to_short(input: &[f32], output: &mut [i16]) -> Result<()> {
    check_lengths(input.len(), output.len())?;
    for (out, &sample) in output.iter_mut().zip(input) {
        let scaled = sample * SHORT_SCALE;
        *out = if scaled >= i16::MAX as f32 {
            i16::MAX
        } else if scaled <= i16::MIN as f32 {
            i16::MIN
        } else {
            scaled.round_ties_even() as i16
        };
    }
    Ok(())
}

/// Scales 32 bit samples to `[-1.0, 1.0)`.
pub fn int_to_float(input: &[i32], output: &mut [f32]) -> Result<()> {
    check_lengths(input.len(), output.len())?;
    for (out, &sample) in output.iter_mut().zip(input) {
        *out = (sample as f64 / INT_SCALE) as f32;
    }
    Ok(())
}

/// Scales samples to 32 bit, rounding half to even and clipping values outside `[-1.0, 1.0)`.
pub fn float_to_int(input: &[f32], output: &mut [i32]) -> Result<()> {
    check_lengths(input.len(), output.len())?;
    for (out, &sample) in output.iter_mut().zip(input) {
        let scaled = sample as f64 * INT_SCALE;
        *out = if scaled >= i32::MAX as f64 {
            i32::MAX
        } else if scaled <= i32::MIN as f64 {
            i32::MIN
        } else {
            scaled.round_ties_even() as i32
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_round_trip_is_exact() {
        let input = [i16::MIN, -12345, -1, 0, 1, 16384, i16::MAX];
        let mut floats = [0.0f32; 7];
        let mut shorts = [0i16; 7];

        short_to_float(&input, &mut floats).unwrap();
        assert_eq!(floats[0], -1.0);
        assert_eq!(floats[5], 0.5);

        float_to_short(&floats, &mut shorts).unwrap();
        assert_eq!(shorts, input);
    }

    #[test]
    fn test_float_to_short_clips_and_rounds() {
        let input = [1.0f32, 1.5, -1.0, -2.0, 0.5 / 32768.0, 1.5 / 32768.0, -2.5 / 32768.0];
        let mut output = [0i16; 7];

        float_to_short(&input, &mut output).unwrap();
        assert_eq!(output, [32767, 32767, -32768, -32768, 0, 2, -2]);
    }

    #[test]
    fn test_int_conversion() {
        let input = [i32::MIN, -1 << 30, 0, 1 << 30];
        let mut floats = [0.0f32; 4];
        int_to_float(&input, &mut floats).unwrap();
        assert_eq!(floats, [-1.0, -0.5, 0.0, 0.5]);

        let mut ints = [0i32; 6];
        float_to_int(&[-1.0, -0.5, 0.0, 0.5, 1.0, 3.0], &mut ints).unwrap();
        assert_eq!(ints, [i32::MIN, -1 << 30, 0, 1 << 30, i32::MAX, i32::MAX]);
    }

    #[test]
    fn test_short_output_is_rejected() {
        let mut output = [0.0f32; 2];
        let error = short_to_float(&[1, 2, 3], &mut output).unwrap_err();
        assert_eq!(error.code(), ErrorCode::BadDataPtr);

        let mut output = [0i32; 0];
        let error = float_to_int(&[0.25], &mut output).unwrap_err();
        assert_eq!(error.code(), ErrorCode::BadDataPtr);
    }

    #[test]
    fn test_longer_output_keeps_tail() {
        let mut output = [9i16; 4];
        float_to_short(&[0.0, 0.5], &mut output).unwrap();
        assert_eq!(output, [0, 16384, 9, 9]);
    }
}
