use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, Mutex, PoisonError},
};

use tracing::debug;

use crate::{
    converter::{Block, MAX_RATIO, Phase, fmod_one, is_valid_ratio, lrint, smoothed_ratio, zeroed},
    error::{Error, ErrorCode, Result},
    fir::convolve,
    window::make_sinc_table,
};

/// Fractional bits of the fixed point filter index.
const SHIFT_BITS: u32 = 12;
const FP_ONE: f64 = (1i64 << SHIFT_BITS) as f64;
const INV_FP_ONE: f64 = 1.0 / FP_ONE;
const FRACTION_MASK: i64 = (1 << SHIFT_BITS) - 1;

const MIN_RATIO_DIFF: f64 = 1e-10;
const MIN_BUFFER_FRAMES: usize = 4096;

#[inline(always)]
fn double_to_fp(value: f64) -> i64 {
    lrint(value * FP_ONE) as i64
}

#[inline(always)]
fn int_to_fp(value: usize) -> i64 {
    (value as i64) << SHIFT_BITS
}

#[inline(always)]
fn fp_to_int(value: i64) -> usize {
    (value >> SHIFT_BITS) as usize
}

#[inline(always)]
fn fp_to_double(value: i64) -> f64 {
    (value & FRACTION_MASK) as f64 * INV_FP_ONE
}

/// Parameters of a Kaiser windowed sinc low pass filter.
///
/// The sinc interpolators differ only in their filter. A longer table (relative to its
/// `increment`) spans more input samples and allows a narrower transition band.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FilterSpec {
    /// Length of the one sided coefficient table.
    pub half_len: usize,
    /// Table entries per input sample.
    pub increment: usize,
    /// Pass band edge as a fraction of the Nyquist frequency.
    pub cutoff: f64,
    /// Kaiser window beta. Higher values trade transition width for stopband attenuation.
    pub beta: f64,
}

impl FilterSpec {
    /// Filter of [`ConverterType::SincFastest`](crate::ConverterType::SincFastest).
    pub const FASTEST: FilterSpec = FilterSpec {
        half_len: 2462,
        increment: 128,
        cutoff: 0.80,
        beta: 9.0,
    };

    /// Filter of [`ConverterType::SincMediumQuality`](crate::ConverterType::SincMediumQuality).
    pub const MEDIUM: FilterSpec = FilterSpec {
        half_len: 22436,
        increment: 491,
        cutoff: 0.90,
        beta: 12.0,
    };

    /// Filter of [`ConverterType::SincBestQuality`](crate::ConverterType::SincBestQuality).
    pub const BEST: FilterSpec = FilterSpec {
        half_len: 340237,
        increment: 2381,
        cutoff: 0.94,
        beta: 14.0,
    };

    /// Number of input samples the filter reaches on either side of its center.
    pub fn half_width(&self) -> f64 {
        (self.half_len + 2) as f64 / self.increment as f64
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct SincCacheKey {
    half_len: usize,
    increment: usize,
    cutoff_bits: u64,
    beta_bits: u64,
}

static SINC_CACHE: LazyLock<Mutex<HashMap<SincCacheKey, Arc<[f32]>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn get_or_create_sinc_table(spec: &FilterSpec) -> Arc<[f32]> {
    let cache_key = SincCacheKey {
        half_len: spec.half_len,
        increment: spec.increment,
        cutoff_bits: spec.cutoff.to_bits(),
        beta_bits: spec.beta.to_bits(),
    };
    SINC_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(cache_key)
        .or_insert_with(|| {
            debug!(
                half_len = spec.half_len,
                increment = spec.increment,
                cutoff = spec.cutoff,
                beta = spec.beta,
                "building sinc coefficient table"
            );
            Arc::from(make_sinc_table(spec))
        })
        .clone()
}

/// Linearly interpolated coefficient at a fixed point table position.
#[inline(always)]
fn interpolate_coeff(coeffs: &[f32], filter_index: i64) -> f32 {
    let fraction = fp_to_double(filter_index);
    let index = fp_to_int(filter_index);
    let low = coeffs[index] as f64;
    let high = coeffs[index + 1] as f64;
    (low + fraction * (high - low)) as f32
}

/// The input consumed by one `process` call.
struct Feed<'a> {
    input: &'a [f32],
    in_used: usize,
    end_of_input: bool,
}

/// Band limited interpolation by convolution with a windowed sinc.
///
/// Input is staged in a linear history buffer. `b_current` is the frame the next output is
/// interpolated after, `b_end` the end of valid data. When the stream ends, `b_real_end` marks
/// the end of real input and the filter tail is zero padded.
pub(crate) struct SincFilter {
    channels: usize,
    half_len: usize,
    increment: usize,
    coeffs: Arc<[f32]>,
    /// History of `b_len` samples plus one frame of headroom.
    buffer: Vec<f32>,
    b_len: usize,
    b_current: usize,
    b_end: usize,
    b_real_end: Option<usize>,
    /// Per frame filter weights of the current output, sized for the lowest ratio.
    weights: Vec<f32>,
}

impl SincFilter {
    pub(crate) fn new(spec: FilterSpec, channels: usize) -> Result<Self> {
        let coeffs = get_or_create_sinc_table(&spec);
        let half_width = spec.half_width();

        let frames = (3.0 * lrint(half_width * MAX_RATIO + 1.0)) as usize;
        let b_len = frames
            .max(MIN_BUFFER_FRAMES)
            .checked_mul(channels)
            .and_then(|len| len.checked_add(1))
            .ok_or_else(|| {
                Error::with_detail(ErrorCode::SincBadBufferLen, format!("channels={channels}"))
            })?;
        let buffer_len = b_len.checked_add(channels).ok_or_else(|| {
            Error::with_detail(ErrorCode::SincBadBufferLen, format!("channels={channels}"))
        })?;

        let max_taps = 2 * (lrint(half_width * MAX_RATIO) as usize + 4);

        Ok(Self {
            channels,
            half_len: spec.half_len,
            increment: spec.increment,
            coeffs,
            buffer: zeroed(buffer_len)?,
            b_len,
            b_current: 0,
            b_end: 0,
            b_real_end: None,
            weights: zeroed(max_taps)?,
        })
    }

    pub(crate) fn reset(&mut self) {
        self.b_current = 0;
        self.b_end = 0;
        self.b_real_end = None;
        self.buffer.fill(0.0);
    }

    pub(crate) fn process(&mut self, phase: &mut Phase, block: Block<'_>) -> Result<(usize, usize)> {
        let Block {
            input,
            output,
            ratio: target_ratio,
            end_of_input,
        } = block;

        if self.b_real_end.is_some() && !input.is_empty() {
            return Err(Error::with_detail(
                ErrorCode::BadSincState,
                format!("input samples={}", input.len()),
            ));
        }

        // Buffered input is only drained once the stream ends.
        if input.is_empty() && !end_of_input {
            return Ok((0, 0));
        }

        let channels = self.channels;
        let mut src_ratio = phase.last_ratio;
        if !is_valid_ratio(src_ratio) {
            return Err(Error::with_detail(
                ErrorCode::BadInternalState,
                format!("last ratio={src_ratio}"),
            ));
        }

        // Filter reach on either side of the center, in input frames.
        let mut count = (self.half_len + 2) as f64 / self.increment as f64;
        let min_ratio = phase.last_ratio.min(target_ratio);
        if min_ratio < 1.0 {
            count /= min_ratio;
        }
        let half_filter_chan_len = channels * (lrint(count) as usize + 1);

        let mut input_index = phase.last_position;
        let rem = fmod_one(input_index);
        self.b_current = (self.b_current + channels * lrint(input_index - rem) as usize) % self.b_len;
        input_index = rem;

        let terminate = 1.0 / src_ratio + 1e-20;

        let mut feed = Feed {
            input,
            in_used: 0,
            end_of_input,
        };
        let out_count = output.len();
        let mut out_gen = 0;

        while out_gen < out_count {
            if self.samples_in_hand() <= half_filter_chan_len {
                self.prepare_data(&mut feed, half_filter_chan_len)?;
                if self.samples_in_hand() <= half_filter_chan_len {
                    break;
                }
            }

            if let Some(real_end) = self.b_real_end {
                let position = (self.b_current / channels) as f64 + input_index + terminate;
                if position > (real_end / channels) as f64 {
                    break;
                }
            }

            if let Some(ratio) = smoothed_ratio(
                phase.last_ratio,
                target_ratio,
                out_gen,
                out_count,
                MIN_RATIO_DIFF,
            ) {
                src_ratio = ratio;
            }

            let float_increment = self.increment as f64 * src_ratio.min(1.0);
            let increment = double_to_fp(float_increment);
            let start_filter_index = double_to_fp(input_index * float_increment);
            let scale = float_increment / self.increment as f64;

            self.calc_output(
                increment,
                start_filter_index,
                scale,
                &mut output[out_gen..out_gen + channels],
            )?;
            out_gen += channels;

            input_index += 1.0 / src_ratio;
            let rem = fmod_one(input_index);
            self.b_current =
                (self.b_current + channels * lrint(input_index - rem) as usize) % self.b_len;
            input_index = rem;
        }

        phase.last_position = input_index;
        phase.last_ratio = src_ratio;

        Ok((feed.in_used, out_gen))
    }

    #[inline(always)]
    fn samples_in_hand(&self) -> usize {
        (self.b_end + self.b_len - self.b_current) % self.b_len
    }

    /// Moves new input into the history and zero pads the tail once the stream ends.
    fn prepare_data(&mut self, feed: &mut Feed<'_>, half_filter_chan_len: usize) -> Result<()> {
        if self.b_real_end.is_some() {
            return Ok(());
        }

        let channels = self.channels;

        let mut len = if self.b_current == 0 {
            // Leave zeros in front of the first frame.
            self.b_current = half_filter_chan_len;
            self.b_end = half_filter_chan_len;
            self.b_len
                .checked_sub(2 * half_filter_chan_len)
                .ok_or_else(|| bad_prepare_len(self.b_len, half_filter_chan_len))?
        } else if self.b_end + half_filter_chan_len + channels < self.b_len {
            self.b_len
                .saturating_sub(self.b_current + half_filter_chan_len)
        } else {
            self.move_down(half_filter_chan_len)?;
            self.b_len
                .saturating_sub(self.b_current + half_filter_chan_len)
        };

        len = len.min(feed.input.len() - feed.in_used);
        len -= len % channels;

        if self.b_end + len > self.b_len {
            return Err(bad_prepare_len(len, half_filter_chan_len));
        }

        self.buffer[self.b_end..self.b_end + len]
            .copy_from_slice(&feed.input[feed.in_used..feed.in_used + len]);
        self.b_end += len;
        feed.in_used += len;

        if feed.in_used == feed.input.len()
            && self.b_end.saturating_sub(self.b_current) < 2 * half_filter_chan_len
            && feed.end_of_input
        {
            if self.b_len - self.b_end < half_filter_chan_len + 5 {
                self.move_down(half_filter_chan_len)?;
            }

            self.b_real_end = Some(self.b_end);

            let len = (half_filter_chan_len + 5).min(self.b_len - self.b_end);
            self.buffer[self.b_end..self.b_end + len].fill(0.0);
            self.b_end += len;
        }

        Ok(())
    }

    /// Moves the unread data plus the filter history in front of it to the start of the buffer.
    fn move_down(&mut self, half_filter_chan_len: usize) -> Result<()> {
        let len = self
            .b_end
            .checked_sub(self.b_current)
            .ok_or_else(|| bad_prepare_len(self.b_end, self.b_current))?;
        let start = self
            .b_current
            .checked_sub(half_filter_chan_len)
            .ok_or_else(|| bad_prepare_len(self.b_current, half_filter_chan_len))?;

        self.buffer
            .copy_within(start..start + half_filter_chan_len + len, 0);
        self.b_current = half_filter_chan_len;
        self.b_end = half_filter_chan_len + len;

        Ok(())
    }

    /// Interpolates one output frame at the fractional position `start_filter_index` after
    /// `b_current`.
    fn calc_output(
        &mut self,
        increment: i64,
        start_filter_index: i64,
        scale: f64,
        output: &mut [f32],
    ) -> Result<()> {
        let channels = self.channels as i64;
        let b_current = self.b_current as i64;
        let max_filter_index = int_to_fp(self.half_len);

        // The left half runs from the oldest frame up to the current one.
        let mut left_index = start_filter_index;
        let coeff_count = (max_filter_index - left_index) / increment;
        left_index += coeff_count * increment;
        let mut left_start = b_current - channels * coeff_count;

        if left_start < 0 {
            let steps = (-left_start + channels - 1) / channels;
            left_index -= increment * steps;
            left_start += steps * channels;
        }

        // The right half runs from the newest frame back down to the one after the current.
        let mut right_index = increment - start_filter_index;
        let coeff_count = (max_filter_index - right_index) / increment;
        right_index += coeff_count * increment;
        let right_start = b_current + channels * (1 + coeff_count);

        let frames = ((right_start - left_start) / channels + 1) as usize;
        if right_start + channels > self.b_end as i64 || frames > self.weights.len() {
            return Err(Error::with_detail(
                ErrorCode::BadInternalState,
                format!(
                    "b_current={} b_end={} frames={frames}",
                    self.b_current, self.b_end
                ),
            ));
        }

        let coeffs = &self.coeffs;
        let weights = &mut self.weights[..frames];
        weights.fill(0.0);

        let mut frame = 0;
        while left_index >= 0 {
            weights[frame] += interpolate_coeff(coeffs, left_index);
            left_index -= increment;
            frame += 1;
        }

        let mut frame = frames - 1;
        loop {
            weights[frame] += interpolate_coeff(coeffs, right_index);
            right_index -= increment;
            if right_index <= 0 {
                break;
            }
            frame -= 1;
        }

        let weights = &self.weights[..frames];
        let data = &self.buffer[left_start as usize..right_start as usize + self.channels];

        if self.channels == 1 {
            output[0] = (scale * convolve(data, weights) as f64) as f32;
        } else {
            for (channel, sample) in output.iter_mut().enumerate() {
                let sum: f64 = weights
                    .iter()
                    .zip(data[channel..].iter().step_by(self.channels))
                    .map(|(&weight, &value)| weight as f64 * value as f64)
                    .sum();
                *sample = (scale * sum) as f32;
            }
        }

        Ok(())
    }
}

fn bad_prepare_len(len: usize, half_filter_chan_len: usize) -> Error {
    Error::with_detail(
        ErrorCode::SincPrepareDataBadLen,
        format!("len={len} half_filter_chan_len={half_filter_chan_len}"),
    )
}
