use tracing::{debug, trace};

use crate::{
    ConverterId, ConverterType,
    error::{Error, ErrorCode, Result},
    hold::ZeroOrderHold,
    linear::Linear,
    sinc::SincFilter,
};

/// The smallest supported conversion ratio.
pub const MIN_RATIO: f64 = 1.0 / 256.0;
/// The largest supported conversion ratio.
pub const MAX_RATIO: f64 = 256.0;

/// Returns `true` if `ratio` (output rate divided by input rate) can be converted.
///
/// `NaN` is never a valid ratio.
pub fn is_valid_ratio(ratio: f64) -> bool {
    (MIN_RATIO..=MAX_RATIO).contains(&ratio)
}

/// Rounds to the nearest integer, ties to even.
#[inline(always)]
pub(crate) fn lrint(value: f64) -> f64 {
    value.round_ties_even()
}

/// Fractional part of `value` in `[0, 1)`, measured from the nearest integer.
#[inline(always)]
pub(crate) fn fmod_one(value: f64) -> f64 {
    let rem = value - lrint(value);
    if rem < 0.0 { rem + 1.0 } else { rem }
}

/// Returns the ratio reached after `out_gen` of `out_count` output samples while gliding from
/// `last` towards `target`, or `None` if both ratios are closer than `min_diff`.
#[inline(always)]
pub(crate) fn smoothed_ratio(
    last: f64,
    target: f64,
    out_gen: usize,
    out_count: usize,
    min_diff: f64,
) -> Option<f64> {
    (out_count > 0 && (last - target).abs() > min_diff)
        .then(|| last + out_gen as f64 * (target - last) / out_count as f64)
}

/// Allocates a zero initialized buffer, reporting allocation failure instead of aborting.
pub(crate) fn zeroed<T: Copy + Default>(len: usize) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::with_detail(ErrorCode::MallocFailed, format!("len={len}")))?;
    buffer.resize(len, T::default());
    Ok(buffer)
}

/// Position and ratio carried from one `process` call to the next.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub(crate) struct Phase {
    /// Ratio reached at the end of the previous call. Zero until the first call.
    pub(crate) last_ratio: f64,
    /// Fractional input position of the next output frame, relative to the next unread frame.
    pub(crate) last_position: f64,
}

/// The buffers and parameters of a single `process` call.
pub(crate) struct Block<'a> {
    pub(crate) input: &'a [f32],
    pub(crate) output: &'a mut [f32],
    pub(crate) ratio: f64,
    pub(crate) end_of_input: bool,
}

enum Algorithm {
    ZeroOrderHold(ZeroOrderHold),
    Linear(Linear),
    Sinc(Box<SincFilter>),
}

impl Algorithm {
    fn new(converter_type: ConverterType, channels: usize) -> Result<Self> {
        match converter_type.filter_spec() {
            Some(spec) => Ok(Algorithm::Sinc(Box::new(SincFilter::new(spec, channels)?))),
            None if converter_type == ConverterType::Linear => {
                Ok(Algorithm::Linear(Linear::new(channels)?))
            }
            None => Ok(Algorithm::ZeroOrderHold(ZeroOrderHold::new(channels)?)),
        }
    }

    /// Returns the number of input and output samples used and generated.
    fn process(&mut self, phase: &mut Phase, block: Block<'_>) -> Result<(usize, usize)> {
        match self {
            Algorithm::ZeroOrderHold(hold) => Ok(hold.process(phase, block)),
            Algorithm::Linear(linear) => Ok(linear.process(phase, block)),
            Algorithm::Sinc(sinc) => sinc.process(phase, block),
        }
    }

    fn reset(&mut self) {
        match self {
            Algorithm::ZeroOrderHold(hold) => hold.reset(),
            Algorithm::Linear(linear) => linear.reset(),
            Algorithm::Sinc(sinc) => sinc.reset(),
        }
    }
}

struct Stream {
    phase: Phase,
    algorithm: Algorithm,
}

/// A streaming sample rate converter for interleaved `f32` audio.
///
/// A converter is bound to one interpolator and one channel count for its whole lifetime. It
/// keeps the history the interpolator needs between calls, so consecutive calls to
/// [`Converter::process`] convert one continuous stream. Use one converter per stream.
///
/// Every buffer holds whole frames of interleaved samples, for stereo that is
/// `[L0, R0, L1, R1, ...]`.
pub struct Converter {
    converter_type: ConverterType,
    channels: usize,
    stream: Option<Stream>,
}

impl Converter {
    /// Opens a new [`Converter`].
    ///
    /// Parameters:
    /// - `converter_type`: The interpolator to use, either a [`ConverterType`] or a raw
    ///   [`ConverterId`].
    /// - `channels`: The channel count, at least one.
    ///
    /// All history is allocated and zeroed here, `process` itself does not allocate.
    ///
    /// # Example
    ///
    /// ```rust
    /// use secretrabbit::{Converter, ConverterId, ConverterType, ErrorCode};
    ///
    /// let converter = Converter::new(ConverterType::SincMediumQuality, 2).unwrap();
    /// assert_eq!(converter.channels(), 2);
    ///
    /// let error = Converter::new(ConverterId(17), 2).err().unwrap();
    /// assert_eq!(error.code(), ErrorCode::BadConverter);
    /// ```
    pub fn new(converter_type: impl Into<ConverterId>, channels: usize) -> Result<Self> {
        if channels == 0 {
            return Err(Error::with_detail(
                ErrorCode::BadChannelCount,
                format!("channels={channels}"),
            ));
        }

        let converter_type = converter_type.into().resolve()?;
        let algorithm = Algorithm::new(converter_type, channels)?;

        debug!(converter = %converter_type, channels, "opened converter");

        Ok(Self {
            converter_type,
            channels,
            stream: Some(Stream {
                phase: Phase::default(),
                algorithm,
            }),
        })
    }

    /// Converts the next block of the stream.
    ///
    /// `input` holds exactly the frames that are new since the previous call, which includes the
    /// frames the previous call did not consume. As many output frames as can be computed from
    /// the history and the new input are written to `output`, bounded by its length.
    ///
    /// `ratio` is the output rate divided by the input rate and must lie in
    /// [`MIN_RATIO`]`..=`[`MAX_RATIO`]. If it differs from the ratio reached by the previous call
    /// the converter glides towards it over the frames produced by this call.
    ///
    /// Set `end_of_input` once the stream has no more input, the sinc interpolators then flush
    /// their history. Keep calling with an empty `input` until no more frames are produced.
    ///
    /// ## Returns
    ///
    /// `Ok((consumed, produced))` in frames. Consuming fewer frames than offered is normal, the
    /// remainder must be offered again.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use secretrabbit::{Converter, ConverterType};
    ///
    /// let mut converter = Converter::new(ConverterType::Linear, 1).unwrap();
    /// let input = [0.0f32, 0.5, 1.0, 0.5];
    /// let mut output = [0.0f32; 8];
    ///
    /// let (consumed, produced) = converter.process(&input, &mut output, 2.0, false).unwrap();
    /// assert!(consumed <= input.len());
    /// assert!(produced <= output.len());
    /// ```
    pub fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        ratio: f64,
        end_of_input: bool,
    ) -> Result<(usize, usize)> {
        let channels = self.channels;
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::new(ErrorCode::BadState));
        };

        if !input.len().is_multiple_of(channels) {
            return Err(Error::with_detail(
                ErrorCode::BadData,
                format!("input samples={} channels={channels}", input.len()),
            ));
        }
        if !output.len().is_multiple_of(channels) {
            return Err(Error::with_detail(
                ErrorCode::BadData,
                format!("output samples={} channels={channels}", output.len()),
            ));
        }
        if !is_valid_ratio(ratio) {
            return Err(Error::with_detail(
                ErrorCode::BadSrcRatio,
                format!("ratio={ratio}"),
            ));
        }
        if overlaps(input, output) {
            return Err(Error::new(ErrorCode::DataOverlap));
        }

        if stream.phase.last_ratio < MIN_RATIO {
            stream.phase.last_ratio = ratio;
        }

        let block = Block {
            input,
            output,
            ratio,
            end_of_input,
        };
        let (used, generated) = stream.algorithm.process(&mut stream.phase, block)?;

        let consumed = used / channels;
        let produced = generated / channels;

        trace!(
            converter = %self.converter_type,
            ratio,
            end_of_input,
            consumed,
            produced,
            "processed block"
        );

        Ok((consumed, produced))
    }

    /// Returns the converter to the state it had right after [`Converter::new`], without
    /// reallocating its history.
    pub fn reset(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::new(ErrorCode::BadState))?;

        stream.phase = Phase::default();
        stream.algorithm.reset();

        debug!(converter = %self.converter_type, "reset converter");

        Ok(())
    }

    /// Sets the ratio the next call to [`Converter::process`] starts from.
    ///
    /// Processing at this ratio afterwards is a step change instead of a glide.
    pub fn set_ratio(&mut self, ratio: f64) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::new(ErrorCode::BadState))?;

        if !is_valid_ratio(ratio) {
            return Err(Error::with_detail(
                ErrorCode::BadSrcRatio,
                format!("ratio={ratio}"),
            ));
        }

        stream.phase.last_ratio = ratio;

        Ok(())
    }

    /// Releases the converter history. Closing twice is a no-op.
    ///
    /// Any later call to [`Converter::process`] fails with [`ErrorCode::BadState`].
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(converter = %self.converter_type, "closed converter");
        }
    }

    /// Returns `true` once [`Converter::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Number of interleaved channels per frame.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The interpolator this converter was opened with.
    pub fn converter_type(&self) -> ConverterType {
        self.converter_type
    }
}

impl core::fmt::Debug for Converter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Converter")
            .field("converter_type", &self.converter_type)
            .field("channels", &self.channels)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Safe code can never alias the buffers, slices built from raw parts can.
fn overlaps(input: &[f32], output: &[f32]) -> bool {
    if input.is_empty() || output.is_empty() {
        return false;
    }
    let input = input.as_ptr_range();
    let output = output.as_ptr_range();
    input.start < output.end && output.start < input.end
}
