use crate::{
    converter::{Block, Phase, fmod_one, lrint, smoothed_ratio, zeroed},
    error::Result,
};

const MIN_RATIO_DIFF: f64 = 1e-20;

/// Linear interpolation between the two input frames bracketing each output position.
pub(crate) struct Linear {
    channels: usize,
    /// The last frame of the previous block, seeded from the first frame after a reset.
    last_value: Vec<f32>,
    dirty: bool,
}

impl Linear {
    pub(crate) fn new(channels: usize) -> Result<Self> {
        Ok(Self {
            channels,
            last_value: zeroed(channels)?,
            dirty: false,
        })
    }

    pub(crate) fn reset(&mut self) {
        self.last_value.fill(0.0);
        self.dirty = false;
    }

    pub(crate) fn process(&mut self, phase: &mut Phase, block: Block<'_>) -> (usize, usize) {
        let Block {
            input,
            output,
            ratio: target_ratio,
            ..
        } = block;

        if input.is_empty() {
            return (0, 0);
        }

        let channels = self.channels;

        if !self.dirty {
            self.last_value.copy_from_slice(&input[..channels]);
            self.dirty = true;
        }

        let in_count = input.len();
        let out_count = output.len();
        let mut in_used = 0;
        let mut out_gen = 0;

        let mut src_ratio = phase.last_ratio;
        let mut input_index = phase.last_position;

        // Output positions between the previous block and the first frame of this one.
        while input_index < 1.0 && out_gen < out_count {
            if (in_used as f64) + (channels as f64) * (1.0 + input_index) >= in_count as f64 {
                break;
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

            for (channel, &last) in self.last_value.iter().enumerate() {
                let last = last as f64;
                output[out_gen + channel] =
                    (last + input_index * (input[channel] as f64 - last)) as f32;
            }
            out_gen += channels;

            input_index += 1.0 / src_ratio;
        }

        let rem = fmod_one(input_index);
        in_used += channels * lrint(input_index - rem) as usize;
        input_index = rem;

        while out_gen < out_count
            && (in_used as f64) + (channels as f64) * input_index < in_count as f64
        {
            if let Some(ratio) = smoothed_ratio(
                phase.last_ratio,
                target_ratio,
                out_gen,
                out_count,
                MIN_RATIO_DIFF,
            ) {
                src_ratio = ratio;
            }

            for channel in 0..channels {
                let previous = match in_used.checked_sub(channels) {
                    Some(index) => input[index + channel],
                    None => self.last_value[channel],
                } as f64;
                let next = input[in_used + channel] as f64;
                output[out_gen + channel] = (previous + input_index * (next - previous)) as f32;
            }
            out_gen += channels;

            input_index += 1.0 / src_ratio;
            let rem = fmod_one(input_index);
            in_used += channels * lrint(input_index - rem) as usize;
            input_index = rem;
        }

        if in_used > in_count {
            input_index += ((in_used - in_count) / channels) as f64;
            in_used = in_count;
        }

        phase.last_position = input_index;

        if in_used > 0 {
            self.last_value
                .copy_from_slice(&input[in_used - channels..in_used]);
        }

        phase.last_ratio = src_ratio;

        (in_used, out_gen)
    }
}
