use core::fmt;

use tracing::debug;

use crate::{
    ConverterId, ConverterType,
    converter::{Converter, is_valid_ratio, zeroed},
    error::{Error, ErrorCode, Result},
};

/// A converter that pulls its input from a closure.
///
/// The closure receives a block of `block_frames * channels` samples, fills it with interleaved
/// frames and returns how many frames it wrote. Returning zero ends the input, after which the
/// converter flushes its history.
pub struct CallbackConverter<F> {
    converter: Converter,
    callback: F,
    block: Vec<f32>,
    /// Unconsumed samples of `block` are `block[start..end]`.
    start: usize,
    end: usize,
}

impl<F> CallbackConverter<F>
where
    F: FnMut(&mut [f32]) -> usize,
{
    /// Creates a pull converter that requests up to `block_frames` frames per callback.
    ///
    /// # Example
    ///
    /// ```rust
    /// use secretrabbit::{CallbackConverter, ConverterType};
    ///
    /// let mut remaining = 100;
    /// let mut converter = CallbackConverter::new(ConverterType::Linear, 1, 32, |block: &mut [f32]| {
    ///     let frames = block.len().min(remaining);
    ///     block[..frames].fill(0.5);
    ///     remaining -= frames;
    ///     frames
    /// })
    /// .unwrap();
    ///
    /// let mut output = [0.0f32; 64];
    /// let produced = converter.read(2.0, &mut output).unwrap();
    /// assert_eq!(produced, 64);
    /// ```
    pub fn new(
        converter_type: impl Into<ConverterId>,
        channels: usize,
        block_frames: usize,
        callback: F,
    ) -> Result<Self> {
        let converter = Converter::new(converter_type, channels)?;

        if block_frames == 0 {
            return Err(Error::with_detail(
                ErrorCode::BadData,
                format!("block_frames={block_frames}"),
            ));
        }
        let block_len = block_frames.checked_mul(channels).ok_or_else(|| {
            Error::with_detail(
                ErrorCode::MallocFailed,
                format!("block_frames={block_frames} channels={channels}"),
            )
        })?;

        Ok(Self {
            converter,
            callback,
            block: zeroed(block_len)?,
            start: 0,
            end: 0,
        })
    }

    /// Produces up to `output.len() / channels` frames at `ratio` and returns how many frames
    /// were written.
    ///
    /// Fewer frames than requested are only returned once the callback has ended the input and
    /// the history is drained.
    pub fn read(&mut self, ratio: f64, output: &mut [f32]) -> Result<usize> {
        if !is_valid_ratio(ratio) {
            return Err(Error::with_detail(
                ErrorCode::BadSrcRatio,
                format!("ratio={ratio}"),
            ));
        }

        let channels = self.converter.channels();
        if !output.len().is_multiple_of(channels) {
            return Err(Error::with_detail(
                ErrorCode::BadData,
                format!("output samples={} channels={channels}", output.len()),
            ));
        }

        let out_frames = output.len() / channels;
        let mut produced = 0;
        let mut end_of_input = false;

        while produced < out_frames {
            if self.start == self.end && !end_of_input {
                let frames = (self.callback)(&mut self.block);
                let block_frames = self.block.len() / channels;
                if frames > block_frames {
                    return Err(Error::with_detail(
                        ErrorCode::BadData,
                        format!("frames={frames} block_frames={block_frames}"),
                    ));
                }

                self.start = 0;
                self.end = frames * channels;
                end_of_input = frames == 0;
            }

            let (consumed, generated) = self.converter.process(
                &self.block[self.start..self.end],
                &mut output[produced * channels..],
                ratio,
                end_of_input,
            )?;
            self.start += consumed * channels;
            produced += generated;

            if generated == 0 && (end_of_input || consumed == 0) {
                break;
            }
        }

        Ok(produced)
    }

    /// Drops any buffered input and returns the converter to its freshly created state.
    pub fn reset(&mut self) -> Result<()> {
        self.converter.reset()?;
        self.start = 0;
        self.end = 0;
        debug!(converter = %self.converter.converter_type(), "reset callback converter");
        Ok(())
    }

    /// Number of interleaved channels per frame.
    pub fn channels(&self) -> usize {
        self.converter.channels()
    }

    /// The interpolator this converter was opened with.
    pub fn converter_type(&self) -> ConverterType {
        self.converter.converter_type()
    }
}

impl<F> fmt::Debug for CallbackConverter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackConverter")
            .field("converter", &self.converter)
            .field("block_len", &self.block.len())
            .field("buffered", &(self.end - self.start))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use core::{cell::Cell, f64::consts::PI};

    use super::*;
    use crate::convert_once;

    fn sine(frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|n| (0.5 * (2.0 * PI * 0.01 * n as f64).sin()) as f32)
            .collect()
    }

    fn drain<F: FnMut(&mut [f32]) -> usize>(
        converter: &mut CallbackConverter<F>,
        ratio: f64,
        chunk_frames: usize,
    ) -> Vec<f32> {
        let channels = converter.channels();
        let mut result = Vec::new();
        let mut output = vec![0.0f32; chunk_frames * channels];

        loop {
            let produced = converter.read(ratio, &mut output).unwrap();
            result.extend_from_slice(&output[..produced * channels]);
            if produced < chunk_frames {
                break;
            }
        }

        result
    }

    #[test]
    fn test_pull_matches_one_shot() {
        let input = sine(1000);
        let expected = convert_once(&input, 1.5, 1, ConverterType::SincFastest).unwrap();

        let mut offset = 0;
        let mut converter =
            CallbackConverter::new(ConverterType::SincFastest, 1, 64, |block: &mut [f32]| {
                let frames = block.len().min(input.len() - offset);
                block[..frames].copy_from_slice(&input[offset..offset + frames]);
                offset += frames;
                frames
            })
            .unwrap();

        let output = drain(&mut converter, 1.5, 100);
        assert_eq!(output.len(), expected.len());
        for (index, (&actual, &expected)) in output.iter().zip(&expected).enumerate() {
            assert!(
                (actual - expected).abs() < 1e-6,
                "Frame {index}: expected {expected}, got {actual}"
            );
        }
    }

    #[test]
    fn test_interleaved_blocks() {
        let mut converter =
            CallbackConverter::new(ConverterType::ZeroOrderHold, 2, 8, |block: &mut [f32]| {
                assert_eq!(block.len(), 16);
                for frame in block.chunks_exact_mut(2) {
                    frame[0] = 0.25;
                    frame[1] = -0.25;
                }
                8
            })
            .unwrap();

        let mut output = [0.0f32; 40];
        assert_eq!(converter.read(1.0, &mut output).unwrap(), 20);
        for frame in output.chunks_exact(2) {
            assert_eq!(frame, &[0.25, -0.25]);
        }
    }

    #[test]
    fn test_invalid_ratio_does_not_pull() {
        let calls = Cell::new(0);
        let mut converter = CallbackConverter::new(ConverterType::Linear, 1, 16, |_: &mut [f32]| {
            calls.set(calls.get() + 1);
            0
        })
        .unwrap();

        let mut output = [0.0f32; 16];
        let error = converter.read(300.0, &mut output).unwrap_err();
        assert_eq!(error.code(), ErrorCode::BadSrcRatio);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_oversized_callback_report() {
        let mut converter =
            CallbackConverter::new(ConverterType::Linear, 1, 16, |_: &mut [f32]| 17).unwrap();

        let mut output = [0.0f32; 16];
        let error = converter.read(1.0, &mut output).unwrap_err();
        assert_eq!(error.code(), ErrorCode::BadData);
    }

    #[test]
    fn test_empty_stream() {
        let mut converter =
            CallbackConverter::new(ConverterType::SincFastest, 1, 16, |_: &mut [f32]| 0).unwrap();

        let mut output = [0.0f32; 16];
        assert_eq!(converter.read(2.0, &mut output).unwrap(), 0);
        assert_eq!(converter.read(2.0, &mut output).unwrap(), 0);
    }

    #[test]
    fn test_reset() {
        let mut converter =
            CallbackConverter::new(ConverterType::Linear, 1, 16, |block: &mut [f32]| {
                block.fill(0.75);
                block.len()
            })
            .unwrap();

        let mut output = [0.0f32; 64];
        assert_eq!(converter.read(2.0, &mut output).unwrap(), 64);
        assert!(output.iter().all(|&sample| sample == 0.75));

        converter.reset().unwrap();
        assert_eq!(converter.read(0.5, &mut output).unwrap(), 64);
        assert!(output.iter().all(|&sample| sample == 0.75));
    }

    #[test]
    fn test_rejects_empty_block() {
        let error = CallbackConverter::new(ConverterType::Linear, 1, 0, |_: &mut [f32]| 0)
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::BadData);
    }
}
