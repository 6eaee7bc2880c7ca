use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use log::{error, info, warn};

use crate::looper::{MasterLooper, Ports};
use crate::types::{MAX_BLOCK_FRAMES, SAMPLE_RATE};

/// Shared clock marking when the current audio cycle began.
///
/// The realtime thread marks each cycle start; the control thread converts
/// elapsed wall time into the frame delays that align mid-cycle commands
/// with the loop boundary. The engine itself never compensates for
/// transport latency.
pub struct CycleTimer {
    epoch: Instant,
    cycle_start_us: AtomicU64,
    sample_rate: u32,
}

impl CycleTimer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            epoch: Instant::now(),
            cycle_start_us: AtomicU64::new(0),
            sample_rate,
        }
    }

    /// Stamp the start of a cycle. Called from the output callback.
    pub fn mark(&self) {
        let now = self.epoch.elapsed().as_micros() as u64;
        self.cycle_start_us.store(now, Ordering::Release);
    }

    /// Frames elapsed since the marked cycle start, clamped to
    /// `max_frames`.
    pub fn frames_since_cycle_start(&self, max_frames: u32) -> u32 {
        let now = self.epoch.elapsed().as_micros() as u64;
        let start = self.cycle_start_us.load(Ordering::Acquire);
        let frames = now.saturating_sub(start) * self.sample_rate as u64 / 1_000_000;
        frames.min(max_frames as u64) as u32
    }
}

/// The duplex audio boundary.
///
/// cpal delivers input and output on separate streams, so the input
/// callback feeds a lock-free sample ring and the output callback drains
/// it, runs the engine's process cycle, and interleaves the result into
/// the device buffer. The output callback owns the `MasterLooper`.
pub struct AudioTransport {
    input_stream: Option<Stream>,
    output_stream: Option<Stream>,
}

impl AudioTransport {
    /// Build and start both streams. The engine moves into the output
    /// callback; commands keep flowing through the inbox handed out at
    /// engine construction.
    pub fn start(
        looper: MasterLooper,
        input_device: &Device,
        output_device: &Device,
        stereo: bool,
        buffer_frames: u32,
        timer: Arc<CycleTimer>,
    ) -> Result<Self> {
        let input_config = input_device
            .default_input_config()
            .context("Failed to get default input config")?;
        let output_config = output_device
            .default_output_config()
            .context("Failed to get default output config")?;

        let in_channels = input_config.channels() as usize;
        let out_channels = output_config.channels() as usize;
        if in_channels == 0 || out_channels == 0 {
            anyhow::bail!("Device reports zero channels");
        }

        let sample_rate = output_config.sample_rate();
        if input_config.sample_rate() != sample_rate {
            warn!(
                "sample rate mismatch: input {}Hz, output {}Hz",
                input_config.sample_rate(),
                sample_rate
            );
        }
        if sample_rate != SAMPLE_RATE {
            warn!("device runs at {sample_rate}Hz, engine assumes {SAMPLE_RATE}Hz");
        }

        let engine_channels: usize = if stereo { 2 } else { 1 };

        // Quarter-second transfer ring between the two streams
        let ring_samples = (sample_rate as usize / 4) * engine_channels;
        let (mut producer, mut consumer) = rtrb::RingBuffer::<f32>::new(ring_samples);

        let input_stream_config = StreamConfig {
            channels: input_config.channels(),
            sample_rate: input_config.sample_rate(),
            buffer_size: cpal::BufferSize::Fixed(buffer_frames),
        };
        let output_stream_config = StreamConfig {
            channels: output_config.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Fixed(buffer_frames),
        };

        // Input side: de-interleave the device frame down to the engine's
        // channel pair and feed the ring. When the ring is full the output
        // side has stalled and frames are dropped.
        let input_callback = move |data: &[f32], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks_exact(in_channels) {
                let l = frame[0];
                if producer.push(l).is_err() {
                    return;
                }
                if engine_channels == 2 {
                    let r = if in_channels >= 2 { frame[1] } else { l };
                    let _ = producer.push(r);
                }
            }
        };

        // Output side: the process cycle. Scratch buffers are allocated
        // here, once, and reused for every callback.
        let mut looper = looper;
        let rt_timer = timer.clone();
        let mut in_l = vec![0.0f32; MAX_BLOCK_FRAMES];
        let mut in_r = vec![0.0f32; MAX_BLOCK_FRAMES];
        let mut out_l = vec![0.0f32; MAX_BLOCK_FRAMES];
        let mut out_r = vec![0.0f32; MAX_BLOCK_FRAMES];
        let output_callback = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            rt_timer.mark();
            for block in data.chunks_mut(MAX_BLOCK_FRAMES * out_channels) {
                let frames = block.len() / out_channels;

                for i in 0..frames {
                    in_l[i] = consumer.pop().unwrap_or(0.0);
                    if engine_channels == 2 {
                        in_r[i] = consumer.pop().unwrap_or(0.0);
                    }
                }

                looper.process(Ports {
                    in_l: &in_l[..frames],
                    in_r: if engine_channels == 2 {
                        Some(&in_r[..frames])
                    } else {
                        None
                    },
                    out_l: &mut out_l[..frames],
                    out_r: if out_channels >= 2 {
                        Some(&mut out_r[..frames])
                    } else {
                        None
                    },
                });

                for i in 0..frames {
                    let frame = &mut block[i * out_channels..(i + 1) * out_channels];
                    frame[0] = out_l[i];
                    if out_channels >= 2 {
                        frame[1] = out_r[i];
                        for extra in &mut frame[2..] {
                            *extra = 0.0;
                        }
                    }
                }
            }
        };

        let input_stream = input_device
            .build_input_stream(
                &input_stream_config,
                input_callback,
                |err| error!("audio input stream error: {err}"),
                None,
            )
            .context("Failed to build audio input stream")?;

        let output_stream = output_device
            .build_output_stream(
                &output_stream_config,
                output_callback,
                |err| error!("audio output stream error: {err}"),
                None,
            )
            .context("Failed to build audio output stream")?;

        input_stream.play().context("Failed to play input stream")?;
        output_stream
            .play()
            .context("Failed to play output stream")?;

        info!(
            "transport running: {in_channels}ch in, {out_channels}ch out, \
             {buffer_frames} frames/cycle @ {sample_rate}Hz"
        );

        Ok(Self {
            input_stream: Some(input_stream),
            output_stream: Some(output_stream),
        })
    }

    /// Pause and release both streams.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.input_stream.take() {
            stream.pause().context("Failed to pause input stream")?;
            drop(stream);
        }
        if let Some(stream) = self.output_stream.take() {
            stream.pause().context("Failed to pause output stream")?;
            drop(stream);
        }
        Ok(())
    }
}

impl Drop for AudioTransport {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
