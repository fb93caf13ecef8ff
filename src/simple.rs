use tracing::debug;

use crate::{
    ConverterId,
    converter::{Converter, is_valid_ratio, zeroed},
    error::{Error, ErrorCode, Result},
};

/// Converts a complete interleaved signal in a single call.
///
/// The output holds as many frames as the converter produces for the whole input with the
/// stream ended, which may be fewer than `ceil(ratio)` frames per input frame. An empty input
/// yields an empty output without opening a converter.
///
/// # Example
///
/// ```rust
/// use secretrabbit::{ConverterType, convert_once};
///
/// let input = [0.1f32, -0.5, 0.3, 0.4, 0.1];
/// let output = convert_once(&input, 1.5, 1, ConverterType::Linear).unwrap();
/// assert_eq!(output.len(), 8);
/// ```
pub fn convert_once(
    input: &[f32],
    ratio: f64,
    channels: usize,
    converter_type: impl Into<ConverterId>,
) -> Result<Vec<f32>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    if !is_valid_ratio(ratio) {
        return Err(Error::with_detail(
            ErrorCode::BadSrcRatio,
            format!("ratio={ratio}"),
        ));
    }

    let mut converter = Converter::new(converter_type, channels)?;

    let frames = input.len() / channels;
    let capacity = frames
        .checked_mul(ratio.ceil() as usize)
        .and_then(|frames| frames.checked_mul(channels))
        .ok_or_else(|| {
            Error::with_detail(
                ErrorCode::MallocFailed,
                format!("frames={frames} ratio={ratio}"),
            )
        })?;
    let mut output = zeroed(capacity)?;

    let result = converter.process(input, &mut output, ratio, true);
    converter.close();
    let (consumed, produced) = result?;

    debug!(
        converter = %converter.converter_type(),
        ratio,
        consumed,
        produced,
        "converted buffer"
    );

    output.truncate(produced * channels);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConverterType;

    #[test]
    fn test_linear_example() {
        let input = [0.1f32, -0.5, 0.3, 0.4, 0.1];
        let expected = [0.1f32, 0.1, -0.1, -0.5, 0.0333, 0.3333, 0.4, 0.2];

        let output = convert_once(&input, 1.5, 1, ConverterType::Linear).unwrap();
        assert_eq!(output.len(), expected.len());
        for (index, (&actual, &expected)) in output.iter().zip(&expected).enumerate() {
            assert!(
                (actual - expected).abs() < 1e-4,
                "Frame {index}: expected {expected}, got {actual}"
            );
        }
    }

    #[test]
    fn test_empty_input() {
        for converter_type in ConverterType::ALL {
            for ratio in [0.5, 1.0, 2.0, -1.0] {
                assert!(convert_once(&[], ratio, 2, converter_type).unwrap().is_empty());
            }
        }
        assert!(convert_once(&[], 1.0, 0, ConverterId(99)).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_ratio() {
        for ratio in [-5.3, 0.0, 1.0 / 512.0, 300.0, f64::NAN] {
            let error = convert_once(&[0.0, 1.0], ratio, 1, ConverterType::Linear).unwrap_err();
            assert_eq!(error.code(), ErrorCode::BadSrcRatio);
            assert!(
                error
                    .to_string()
                    .contains("SRC ratio outside [1/256, 256] range."),
                "Unexpected message: {error}"
            );
        }
    }

    #[test]
    fn test_invalid_converter_and_channels() {
        let error = convert_once(&[0.0, 1.0], 1.0, 1, ConverterId(5)).unwrap_err();
        assert_eq!(error.code(), ErrorCode::BadConverter);

        let error = convert_once(&[0.0, 1.0], 1.0, 0, ConverterType::Linear).unwrap_err();
        assert_eq!(error.code(), ErrorCode::BadChannelCount);

        let error = convert_once(&[0.0, 1.0, 2.0], 1.0, 2, ConverterType::Linear).unwrap_err();
        assert_eq!(error.code(), ErrorCode::BadData);
    }

    #[test]
    fn test_output_bound() {
        let input: Vec<f32> = (0..480).map(|n| (n as f32 * 0.05).sin() * 0.5).collect();

        for converter_type in ConverterType::ALL {
            for ratio in [0.25, 0.9, 1.0, 1.5, 3.0] {
                let output = convert_once(&input, ratio, 2, converter_type).unwrap();
                let bound = 240 * ratio.ceil() as usize * 2;
                assert!(output.len() <= bound);
                assert!(output.len().is_multiple_of(2));
                assert!(!output.is_empty(), "{converter_type} at {ratio} produced nothing");
            }
        }
    }
}
