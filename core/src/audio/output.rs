//! Hardware audio output through cpal
//!
//! Owns the device stream and drives an [`AudioRenderer`] from its callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error};

use super::{AudioError, AudioFormat, AudioRenderer};

/// Default-device output stream.
///
/// The renderer sits behind a mutex that the callback only `try_lock`s, so a
/// rebuild on the owning thread never stalls the device; a contended callback
/// plays silence.
pub struct AudioOutput {
    renderer: Arc<Mutex<AudioRenderer>>,
    /// The cpal stream (kept alive for the duration)
    _stream: cpal::Stream,
    format: AudioFormat,
    device_lost: Arc<AtomicBool>,
}

impl AudioOutput {
    /// Open the default output device and start pulling from `renderer`.
    ///
    /// Feed [`format`](Self::format) to the pipeline's `reconfigure` so native
    /// audio is converted to what the device wants.
    pub fn new(renderer: AudioRenderer) -> Result<Self, AudioError> {
        let renderer = Arc::new(Mutex::new(renderer));
        let device_lost = Arc::new(AtomicBool::new(false));
        let (stream, format) = open_stream(renderer.clone(), device_lost.clone())?;

        Ok(Self {
            renderer,
            _stream: stream,
            format,
            device_lost,
        })
    }

    /// Format the current device stream expects
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// True once the stream reported its device went away
    pub fn needs_rebuild(&self) -> bool {
        self.device_lost.load(Ordering::Acquire)
    }

    /// Reopen the default device, returning its (possibly new) format.
    pub fn rebuild(&mut self) -> Result<AudioFormat, AudioError> {
        self.device_lost.store(false, Ordering::Release);
        let (stream, format) = open_stream(self.renderer.clone(), self.device_lost.clone())?;
        self._stream = stream;
        self.format = format;
        Ok(format)
    }
}

fn open_stream(
    renderer: Arc<Mutex<AudioRenderer>>,
    device_lost: Arc<AtomicBool>,
) -> Result<(cpal::Stream, AudioFormat), AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    let config = device
        .default_output_config()
        .map_err(|e| AudioError::Device(format!("failed to get default output config: {e}")))?;

    let format = AudioFormat::new(config.sample_rate().0, config.channels());
    let sample_format = config.sample_format();
    let stream_config: cpal::StreamConfig = config.into();

    let on_error = move |err: cpal::StreamError| {
        error!("audio stream error: {err}");
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            device_lost.store(true, Ordering::Release);
        }
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                match renderer.try_lock() {
                    Ok(mut renderer) => {
                        renderer.render(data);
                    }
                    Err(_) => data.fill(0.0),
                }
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::I16 => {
            // Pre-allocated; resized only if the device changes block size
            let mut temp_buffer: Vec<f32> = vec![0.0; 4096];
            device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    if temp_buffer.len() < data.len() {
                        temp_buffer.resize(data.len(), 0.0);
                    }
                    let block = &mut temp_buffer[..data.len()];
                    match renderer.try_lock() {
                        Ok(mut renderer) => {
                            renderer.render(block);
                        }
                        Err(_) => block.fill(0.0),
                    }
                    for (out, &f) in data.iter_mut().zip(block.iter()) {
                        *out = (f * 32767.0).clamp(-32768.0, 32767.0) as i16;
                    }
                },
                on_error,
                None,
            )
        }
        cpal::SampleFormat::U16 => {
            let mut temp_buffer: Vec<f32> = vec![0.0; 4096];
            device.build_output_stream(
                &stream_config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    if temp_buffer.len() < data.len() {
                        temp_buffer.resize(data.len(), 0.0);
                    }
                    let block = &mut temp_buffer[..data.len()];
                    match renderer.try_lock() {
                        Ok(mut renderer) => {
                            renderer.render(block);
                        }
                        Err(_) => block.fill(0.0),
                    }
                    // 0x8000 is silence for u16 audio
                    for (out, &f) in data.iter_mut().zip(block.iter()) {
                        *out = (f * 32767.0 + 32768.0).clamp(0.0, 65535.0) as u16;
                    }
                },
                on_error,
                None,
            )
        }
        other => {
            return Err(AudioError::Device(format!(
                "unsupported sample format: {other:?}"
            )));
        }
    }
    .map_err(|e| AudioError::Device(format!("failed to build audio stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AudioError::Device(format!("failed to play audio stream: {e}")))?;

    debug!("audio output stream started at {format}");
    Ok((stream, format))
}
