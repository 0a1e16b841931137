//! CPAL-based audio output backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, error, warn};
use ws_engine::Frame;

use crate::traits::{AudioError, AudioOutput};

/// How long `write` sleeps while the ring is full.
const BACKOFF: Duration = Duration::from_millis(1);

/// CPAL-based audio output.
///
/// Frames travel to the device callback through a ring buffer of about
/// 100 ms. `write` blocks while the ring is full, which paces the
/// producer to the device clock.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<Frame>,
    consumer: Option<HeapCons<Frame>>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default device in stereo, at `sample_rate` if the device
    /// supports it and at its default rate otherwise.
    pub fn new(sample_rate: u32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?
            .find(|c| {
                c.channels() == 2
                    && c.min_sample_rate().0 <= sample_rate
                    && c.max_sample_rate().0 >= sample_rate
            });

        let mut config: StreamConfig = match supported {
            Some(range) => range.with_sample_rate(SampleRate(sample_rate)).into(),
            None => {
                let fallback = device
                    .default_output_config()
                    .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
                warn!(
                    requested = sample_rate,
                    device_rate = fallback.sample_rate().0,
                    "sample rate not supported, using device default"
                );
                fallback.into()
            }
        };
        // The callback assumes 2-channel interleaving
        config.channels = 2;

        let capacity = (config.sample_rate.0 as usize / 10).max(1024);
        let (producer, consumer) = HeapRb::<Frame>::new(capacity).split();
        debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            capacity,
            "audio device opened"
        );

        Ok(Self {
            device,
            config,
            stream: None,
            producer,
            consumer: Some(consumer),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Build the device stream. Must be called once before `start`.
    pub fn build_stream(&mut self) -> Result<(), AudioError> {
        let Some(mut consumer) = self.consumer.take() else {
            return Ok(());
        };
        let running = self.running.clone();
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    for chunk in data.chunks_mut(channels) {
                        let frame = consumer.try_pop().unwrap_or_default();
                        let left = frame.left as f32 / 32768.0;
                        let right = frame.right as f32 / 32768.0;
                        for (i, sample) in chunk.iter_mut().enumerate() {
                            *sample = match i {
                                0 => left,
                                1 => right,
                                _ => 0.0,
                            };
                        }
                    }
                },
                |err| error!(%err, "audio stream error"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    /// Frames waiting for the device.
    pub fn queued(&self) -> usize {
        self.producer.occupied_len()
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError> {
        let mut rest = frames;
        while !rest.is_empty() {
            if !self.running.load(Ordering::Relaxed) {
                return Ok(());
            }
            let pushed = self.producer.push_slice(rest);
            rest = &rest[pushed..];
            if !rest.is_empty() {
                std::thread::sleep(BACKOFF);
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if self.stream.is_none() {
            self.build_stream()?;
        }
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}
