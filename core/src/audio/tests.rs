use super::*;
use std::time::Duration;

use crate::config::AudioConfig;

const TICK: Duration = Duration::from_millis(10);

fn stereo(rate: u32) -> AudioFormat {
    AudioFormat::new(rate, 2)
}

fn started_pipeline(native: AudioFormat) -> (AudioPipeline, AudioRenderer) {
    let (mut pipeline, renderer) = AudioPipeline::new(native, TICK, &AudioConfig::default()).unwrap();
    pipeline.start();
    (pipeline, renderer)
}

/// Converter that always fails, for error absorption tests
struct BrokenConverter;

impl FormatConverter for BrokenConverter {
    fn required_input_frames(&self, output_frames: usize) -> usize {
        output_frames
    }
    fn next_input_frames(&self, output_frames: usize) -> usize {
        output_frames
    }
    fn set_rate(&mut self, _rate: f64) {}
    fn convert(&mut self, _input: &[i16], _output: &mut [f32]) -> Result<(), AudioError> {
        Err(AudioError::Conversion("broken".into()))
    }
    fn reset(&mut self) {}
}

// ============================================================================
// AudioFormat
// ============================================================================

#[test]
fn test_format_byte_helpers() {
    let format = stereo(48_000);
    assert_eq!(format.bytes_per_frame(), 4);
    assert_eq!(format.frames_for(Duration::from_millis(10)), 480);
    assert_eq!(format.frames_to_bytes(3), 12);
    assert_eq!(format.bytes_to_frames(13), 3);
    assert_eq!(format.align(13), 12);
}

#[test]
fn test_format_validation() {
    assert!(AudioFormat::new(0, 2).validate().is_err());
    assert!(AudioFormat::new(44_100, 0).validate().is_err());
    assert!(stereo(44_100).validate().is_ok());
}

// ============================================================================
// Sizing
// ============================================================================

#[test]
fn test_ring_buffer_size_formula() {
    // 480 frames/tick * 4 bytes * (ceil(1.0) + 3)
    let size = ring_buffer_size(stereo(48_000), stereo(48_000), TICK, 1.0, 3).unwrap();
    assert_eq!(size, 480 * 4 * 4);

    // Downsampling 48k -> 44.1k needs ceil(1.088) = 2 blocks
    let size = ring_buffer_size(stereo(48_000), stereo(44_100), TICK, 1.0, 3).unwrap();
    assert_eq!(size, 480 * 4 * 5);
}

#[test]
fn test_ring_buffer_size_scales_with_fast_forward() {
    let normal = ring_buffer_size(stereo(48_000), stereo(48_000), TICK, 1.0, 3).unwrap();
    let fast = ring_buffer_size(stereo(48_000), stereo(48_000), TICK, 4.0, 3).unwrap();
    let slow = ring_buffer_size(stereo(48_000), stereo(48_000), TICK, 0.5, 3).unwrap();
    assert!(fast > normal);
    assert_eq!(slow, normal);
}

// ============================================================================
// LinearConverter
// ============================================================================

#[test]
fn test_linear_converter_identity_rate() {
    let mut converter = LinearConverter::new(stereo(48_000), stereo(48_000)).unwrap();
    assert_eq!(converter.required_input_frames(4), 4);
    assert_eq!(converter.next_input_frames(4), 4);

    let input: Vec<i16> = vec![16384, -16384, 16384, -16384, 0, 0, 8192, 8192];
    let mut output = vec![0.0f32; 8];
    converter.convert(&input, &mut output).unwrap();

    // One frame of latency: the first output frame is the (silent) history
    assert_eq!(&output[..2], &[0.0, 0.0]);
    assert_eq!(&output[2..4], &[0.5, -0.5]);
    assert_eq!(&output[4..6], &[0.5, -0.5]);
    assert_eq!(&output[6..8], &[0.0, 0.0]);
}

#[test]
fn test_linear_converter_downmixes_to_mono() {
    let mut converter = LinearConverter::new(stereo(8_000), AudioFormat::new(8_000, 1)).unwrap();
    let input: Vec<i16> = vec![16384, 0, 16384, 0];
    let mut output = vec![0.0f32; 2];
    converter.convert(&input, &mut output).unwrap();
    assert_eq!(output[1], 0.25);
}

#[test]
fn test_linear_converter_rate_scales_consumption() {
    let mut converter = LinearConverter::new(stereo(48_000), stereo(48_000)).unwrap();
    converter.set_rate(2.0);
    assert_eq!(converter.required_input_frames(100), 200);
    assert_eq!(converter.next_input_frames(100), 200);
}

#[test]
fn test_linear_converter_consumption_tracks_ratio_over_time() {
    let mut converter = LinearConverter::new(stereo(44_100), stereo(48_000)).unwrap();
    let mut consumed = 0;
    let mut output = vec![0.0f32; 512 * 2];
    for _ in 0..100 {
        let frames = converter.next_input_frames(512);
        assert!(frames <= converter.required_input_frames(512));
        let input = vec![0i16; frames * 2];
        converter.convert(&input, &mut output).unwrap();
        consumed += frames;
    }
    let expected = 512.0 * 100.0 * 44_100.0 / 48_000.0;
    assert!((consumed as f64 - expected).abs() <= 1.0);
}

#[test]
fn test_linear_converter_rejects_wrong_input_length() {
    let mut converter = LinearConverter::new(stereo(48_000), stereo(48_000)).unwrap();
    let mut output = vec![0.0f32; 8];
    assert!(matches!(
        converter.convert(&[0; 2], &mut output),
        Err(AudioError::Conversion(_))
    ));
}

// ============================================================================
// Pipeline / renderer
// ============================================================================

#[test]
fn test_render_without_enough_frames_is_silent() {
    let (mut pipeline, mut renderer) = started_pipeline(stereo(48_000));

    // Fewer frames than one 480-frame block needs
    pipeline.write_samples(&vec![1000i16; 100 * 2]);

    let mut out = vec![1.0f32; 480 * 2];
    assert_eq!(renderer.render(&mut out), 0);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(pipeline.stats().underruns, 1);
    // Nothing consumed while starving
    assert_eq!(pipeline.buffered_bytes(), 100 * 4);
}

#[test]
fn test_render_with_enough_frames_converts() {
    let (mut pipeline, mut renderer) = started_pipeline(stereo(48_000));
    pipeline.write_samples(&vec![16384i16; 480 * 2]);

    let mut out = vec![0.0f32; 480 * 2];
    assert_eq!(renderer.render(&mut out), 480);
    assert!(out[2..].iter().all(|&s| s == 0.5));
    assert_eq!(pipeline.buffered_bytes(), 0);
    assert_eq!(pipeline.stats().blocks_rendered, 1);
}

#[test]
fn test_render_before_start_is_silent() {
    let (mut pipeline, mut renderer) =
        AudioPipeline::new(stereo(48_000), TICK, &AudioConfig::default()).unwrap();
    assert_eq!(pipeline.write_samples(&[1, 2, 3, 4]), 0);

    let mut out = vec![1.0f32; 64];
    assert_eq!(renderer.render(&mut out), 0);
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn test_write_truncates_to_whole_frames() {
    let (mut pipeline, _renderer) = started_pipeline(stereo(48_000));
    let capacity = pipeline.ring_capacity();

    let accepted = pipeline.write(&vec![0u8; capacity + 7]);
    assert_eq!(accepted, capacity);
    assert_eq!(accepted % 4, 0);
    assert_eq!(pipeline.stats().bytes_dropped, 7);

    // Odd-length writes never split a frame
    let (mut pipeline, _renderer) = started_pipeline(stereo(48_000));
    assert_eq!(pipeline.write(&[0u8; 6]), 4);
}

#[test]
fn test_disable_mutes_and_resets() {
    let (mut pipeline, mut renderer) = started_pipeline(stereo(48_000));
    pipeline.write_samples(&vec![16384i16; 960 * 2]);

    pipeline.set_enabled(false);
    let mut out = vec![1.0f32; 480 * 2];
    assert_eq!(renderer.render(&mut out), 0);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(pipeline.write_samples(&[1, 1]), 0);

    pipeline.set_enabled(true);
    // The stale buffered audio is gone
    assert_eq!(renderer.render(&mut out), 0);
    assert_eq!(pipeline.buffered_bytes(), 0);
}

#[test]
fn test_stop_discards_buffered_audio() {
    let (mut pipeline, mut renderer) = started_pipeline(stereo(48_000));
    pipeline.write_samples(&vec![16384i16; 960 * 2]);
    pipeline.stop();
    assert!(!pipeline.is_running());

    pipeline.start();
    let mut out = vec![1.0f32; 480 * 2];
    assert_eq!(renderer.render(&mut out), 0);
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn test_reconfigure_resizes_and_switches_frame_size() {
    let (mut pipeline, mut renderer) = started_pipeline(stereo(48_000));
    pipeline.write_samples(&vec![16384i16; 960 * 2]);
    let old_capacity = pipeline.ring_capacity();
    assert_eq!(renderer.output_format(), Some(stereo(48_000)));

    // Route change: mono 24 kHz device
    let mono = AudioFormat::new(24_000, 1);
    pipeline.reconfigure(mono).unwrap();
    assert_ne!(pipeline.ring_capacity(), old_capacity);
    assert_eq!(pipeline.buffered_bytes(), 0);
    assert_eq!(pipeline.output_format(), mono);
    assert_eq!(renderer.output_format(), Some(mono));

    // A 240-frame mono block consumes 480 native stereo frames
    pipeline.write_samples(&vec![16384i16; 480 * 2]);
    let mut out = vec![0.0f32; 240];
    assert_eq!(renderer.render(&mut out), 240);
    assert!(out[1..].iter().all(|&s| s == 0.5));
    assert_eq!(pipeline.stats().reconfigurations, 1);
}

#[test]
fn test_reconfigure_rejects_invalid_format() {
    let (mut pipeline, _renderer) = started_pipeline(stereo(48_000));
    let capacity = pipeline.ring_capacity();
    assert!(pipeline.reconfigure(AudioFormat::new(0, 2)).is_err());
    assert_eq!(pipeline.ring_capacity(), capacity);
}

#[test]
fn test_conversion_error_produces_silence() {
    let (mut pipeline, mut renderer) = started_pipeline(stereo(48_000));
    pipeline
        .set_converter_factory(|_, _| Ok(Box::new(BrokenConverter) as Box<dyn FormatConverter>))
        .unwrap();
    pipeline.write_samples(&vec![16384i16; 480 * 2]);

    let mut out = vec![1.0f32; 480 * 2];
    assert_eq!(renderer.render(&mut out), 0);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(pipeline.stats().conversion_errors, 1);
}

#[test]
fn test_fast_forward_consumes_more_native_audio() {
    let (mut pipeline, mut renderer) = started_pipeline(stereo(48_000));
    pipeline.set_rate(2.0);
    assert_eq!(pipeline.rate(), 2.0);

    pipeline.write_samples(&vec![0i16; 960 * 2]);
    let mut out = vec![0.0f32; 480 * 2];
    assert_eq!(renderer.render(&mut out), 480);
    assert_eq!(pipeline.buffered_bytes(), 0);
}

#[test]
fn test_invalid_rate_ignored() {
    let (mut pipeline, _renderer) = started_pipeline(stereo(48_000));
    pipeline.set_rate(0.0);
    pipeline.set_rate(f64::NAN);
    assert_eq!(pipeline.rate(), 1.0);
}

#[test]
fn test_odd_sized_output_block_padded_with_silence() {
    let (mut pipeline, mut renderer) = started_pipeline(stereo(48_000));
    pipeline.write_samples(&vec![16384i16; 480 * 2]);

    let mut out = vec![1.0f32; 7];
    assert_eq!(renderer.render(&mut out), 3);
    assert_eq!(out[6], 0.0);
}
