use std::time::Instant;

use anyhow::{Context, bail};
use clap::Parser;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use secretrabbit::{Converter, ConverterType, is_valid_ratio};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "resample")]
#[command(about = "Convert WAV files to a different sample rate", long_about = None)]
struct Cli {
    /// One of best, medium, fastest, zoh or linear.
    #[arg(long, default_value = "medium")]
    converter: ConverterType,
    #[arg(long, value_name = "RATE")]
    sample_rate: u32,
    input: String,
    output: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut reader =
        WavReader::open(&cli.input).with_context(|| format!("failed to open {}", cli.input))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let ratio = cli.sample_rate as f64 / spec.sample_rate as f64;
    if !is_valid_ratio(ratio) {
        bail!(
            "Cannot convert {} Hz to {} Hz: the ratio must lie within [1/256, 256]",
            spec.sample_rate,
            cli.sample_rate
        );
    }

    println!(
        "Input: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );
    println!("Output: {} Hz", cli.sample_rate);
    println!("Method: {}", cli.converter);

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|sample| sample as f32 / max_value))
                .collect::<Result<_, _>>()?
        }
    };

    let input_frames = samples.len() / channels;
    println!("Input frames: {input_frames}");

    let start = Instant::now();
    let mut converter = Converter::new(cli.converter, channels)?;
    let converted = convert_stream(&mut converter, &samples, ratio)?;
    converter.close();
    let elapsed = start.elapsed();

    let output_frames = converted.len() / channels;
    println!("Output frames: {output_frames}");

    let output_size_mib = (converted.len() * size_of::<f32>()) as f64 / (1024.0 * 1024.0);
    let elapsed_secs = elapsed.as_secs_f64();
    let throughput_mib_per_sec = output_size_mib / elapsed_secs;
    println!(
        "Conversion took {:.3} ms ({throughput_mib_per_sec:.2} MiB/s)",
        elapsed_secs * 1000.0
    );

    let output_spec = WavSpec {
        channels: spec.channels,
        sample_rate: cli.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(&cli.output, output_spec)
        .with_context(|| format!("failed to create {}", cli.output))?;
    for &sample in &converted {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    info!(path = %cli.output, frames = output_frames, "wrote output");
    println!("Done! Written to {}", cli.output);

    Ok(())
}

/// Streams `input` through the converter in fixed size chunks and drains it at the end.
fn convert_stream(
    converter: &mut Converter,
    input: &[f32],
    ratio: f64,
) -> anyhow::Result<Vec<f32>> {
    const CHUNK_FRAMES: usize = 512;

    let channels = converter.channels();
    let chunk_len = CHUNK_FRAMES * channels;
    let output_frames = (CHUNK_FRAMES as f64 * ratio).ceil() as usize + 1;

    let mut output_buffer = vec![0.0f32; output_frames * channels];
    let mut output = Vec::with_capacity((input.len() as f64 * ratio) as usize + chunk_len);
    let mut input_offset = 0;

    loop {
        let end = (input_offset + chunk_len).min(input.len());
        let end_of_input = end == input.len();

        let (consumed, produced) = converter.process(
            &input[input_offset..end],
            &mut output_buffer,
            ratio,
            end_of_input,
        )?;
        input_offset += consumed * channels;
        output.extend_from_slice(&output_buffer[..produced * channels]);

        if produced == 0 && consumed == 0 {
            if end_of_input && input_offset == input.len() {
                break;
            }
            bail!("Converter stalled at input frame {}", input_offset / channels);
        }
    }

    debug!(
        input_frames = input.len() / channels,
        output_frames = output.len() / channels,
        "drained converter"
    );

    Ok(output)
}
