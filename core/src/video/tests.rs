use super::*;
use std::sync::Arc;
use std::time::Duration;

use crate::config::VideoConfig;
use crate::sync::Semaphore;
use crate::test_utils::RecordingPresenter;

const WAIT: Duration = Duration::from_secs(5);

fn frame(width: u32, height: u32, data: Vec<u8>) -> RenderedFrame {
    RenderedFrame {
        width,
        height,
        pixel_format: PixelFormat::Rgba8,
        data,
        seed: 1,
    }
}

fn write_frame(pipeline: &mut VideoPipeline, fill: u8) {
    pipeline.video_buffer().fill(fill);
    pipeline.did_update_video_buffer();
}

/// Presenter that parks inside `present` until released
struct GatedPresenter {
    entered: Arc<Semaphore>,
    release: Arc<Semaphore>,
}

impl FramePresenter for GatedPresenter {
    fn present(&mut self, _frame: &RenderedFrame) -> Result<(), VideoError> {
        self.entered.signal();
        self.release.wait();
        Ok(())
    }
}

struct FailingPresenter;

impl FramePresenter for FailingPresenter {
    fn present(&mut self, _frame: &RenderedFrame) -> Result<(), VideoError> {
        Err(VideoError::Present("surface lost".into()))
    }
}

// ============================================================================
// Formats
// ============================================================================

#[test]
fn test_video_format_sizes() {
    let format = VideoFormat::new(PixelFormat::Rgb565, 256, 224);
    assert_eq!(format.bytes_per_pixel(), 2);
    assert_eq!(format.buffer_size(), 256 * 224 * 2);
    assert_eq!(PixelFormat::Rgb565.output(), PixelFormat::Bgra8);
    assert_eq!(PixelFormat::Rgba8.output(), PixelFormat::Rgba8);
}

#[test]
fn test_video_format_rejects_empty_dimensions() {
    assert!(VideoFormat::new(PixelFormat::Bgra8, 0, 10).validate().is_err());
    assert!(VideoPipeline::new(VideoFormat::new(PixelFormat::Bgra8, 10, 0), &VideoConfig::default()).is_err());
}

#[test]
fn test_rgb565_expands_to_opaque_bgra() {
    let format = VideoFormat::new(PixelFormat::Rgb565, 3, 1);
    let src: Vec<u8> = [0xF800u16, 0x07E0, 0x001F]
        .iter()
        .flat_map(|p| p.to_le_bytes())
        .collect();
    let mut dst = Vec::new();
    format::convert_to_output(&format, &src, &mut dst);
    assert_eq!(dst, vec![0, 0, 255, 255, 0, 255, 0, 255, 255, 0, 0, 255]);
}

// ============================================================================
// Viewport and filters
// ============================================================================

#[test]
fn test_viewport_clamps_to_frame() {
    let viewport = Viewport::new(2, 2, 100, 100);
    assert_eq!(viewport.clamp_to(10, 8), Some(Viewport::new(2, 2, 8, 6)));
    assert_eq!(Viewport::new(20, 0, 5, 5).clamp_to(10, 8), None);
    assert_eq!(Viewport::new(0, 0, 0, 5).clamp_to(10, 8), None);
}

#[test]
fn test_crop_extracts_region() {
    let data: Vec<u8> = (0..16u8).flat_map(|i| [i, i, i, 255]).collect();
    let cropped = filter::crop(frame(4, 4, data), Viewport::new(1, 1, 2, 2));
    assert_eq!((cropped.width, cropped.height), (2, 2));
    assert_eq!(cropped.pixel(0, 0)[0], 5);
    assert_eq!(cropped.pixel(1, 0)[0], 6);
    assert_eq!(cropped.pixel(0, 1)[0], 9);
    assert_eq!(cropped.pixel(1, 1)[0], 10);
}

#[test]
fn test_scale_filter_nearest() {
    let input = frame(2, 1, vec![10, 10, 10, 255, 200, 200, 200, 255]);
    let scaled = ScaleFilter::new(2, SamplerMode::Nearest).apply(&input);
    assert_eq!((scaled.width, scaled.height), (4, 2));
    assert_eq!(scaled.pixel(1, 1), [10, 10, 10, 255]);
    assert_eq!(scaled.pixel(2, 0), [200, 200, 200, 255]);
}

#[test]
fn test_scale_filter_linear_blends_neighbours() {
    let input = frame(2, 1, vec![0, 0, 0, 255, 200, 200, 200, 255]);
    let scaled = ScaleFilter::new(2, SamplerMode::Linear).apply(&input);
    // Edges clamp to the source pixels, inner samples blend 3:1
    assert_eq!(scaled.pixel(0, 0)[0], 0);
    assert_eq!(scaled.pixel(1, 0)[0], 50);
    assert_eq!(scaled.pixel(2, 0)[0], 150);
    assert_eq!(scaled.pixel(3, 0)[0], 200);
}

#[test]
fn test_scale_filter_factor_is_bounded() {
    assert_eq!(ScaleFilter::new(0, SamplerMode::Nearest).factor(), 1);
    assert_eq!(ScaleFilter::new(u32::MAX, SamplerMode::Nearest).factor(), MAX_SCALE_FACTOR);

    let input = frame(2, 1, vec![1; 8]);
    let scaled = ScaleFilter::new(1 << 30, SamplerMode::Nearest).apply(&input);
    assert_eq!((scaled.width, scaled.height), (16, 8));
}

#[test]
fn test_filter_chain_is_idempotent() {
    let chain = FilterChain::new().with(ScaleFilter::new(2, SamplerMode::Linear));
    let input = frame(2, 2, (0..16).collect());
    let first = chain.apply(input.clone());
    let second = chain.apply(input.clone());
    assert_eq!(first, second);
    assert_eq!(input.data, (0..16).collect::<Vec<u8>>());
}

// ============================================================================
// Handoff
// ============================================================================

#[test]
fn test_completed_frame_is_presented() {
    let mut pipeline = VideoPipeline::new(
        VideoFormat::new(PixelFormat::Rgba8, 2, 2),
        &VideoConfig::default(),
    )
    .unwrap();
    let presenter = RecordingPresenter::default();
    pipeline.set_presenter(Box::new(presenter.clone()));

    write_frame(&mut pipeline, 7);
    assert!(pipeline.wait_for_render(WAIT));

    let frames = presenter.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].seed, 1);
    assert!(frames[0].data.iter().all(|&b| b == 7));
    assert_eq!(pipeline.stats().frames_published, 1);
}

#[test]
fn test_unchanged_seed_skips_render() {
    let mut pipeline = VideoPipeline::new(
        VideoFormat::new(PixelFormat::Rgba8, 2, 2),
        &VideoConfig::default(),
    )
    .unwrap();
    write_frame(&mut pipeline, 1);
    assert!(pipeline.wait_for_render(WAIT));

    // No write since the last publish
    pipeline.did_update_video_buffer();
    let stats = pipeline.stats();
    assert_eq!(stats.frames_published, 1);
    assert_eq!(stats.redundant_skipped, 1);
    assert_eq!(pipeline.seed(), 1);
}

#[test]
fn test_busy_renderer_drops_frames_without_blocking() {
    let mut pipeline = VideoPipeline::new(
        VideoFormat::new(PixelFormat::Rgba8, 2, 2),
        &VideoConfig::default(),
    )
    .unwrap();
    let entered = Arc::new(Semaphore::new(0));
    let release = Arc::new(Semaphore::new(0));
    pipeline.set_presenter(Box::new(GatedPresenter {
        entered: entered.clone(),
        release: release.clone(),
    }));

    write_frame(&mut pipeline, 1);
    assert!(entered.wait_timeout(WAIT));

    // Renderer is stuck inside present; these must return immediately
    write_frame(&mut pipeline, 2);
    write_frame(&mut pipeline, 3);
    let stats = pipeline.stats();
    assert_eq!(stats.frames_published, 1);
    assert_eq!(stats.frames_dropped, 2);
    assert_eq!(pipeline.seed(), 3);

    release.signal();
    assert!(pipeline.wait_for_render(WAIT));

    // The next completed frame goes through again
    write_frame(&mut pipeline, 4);
    assert!(entered.wait_timeout(WAIT));
    release.signal();
    assert!(pipeline.wait_for_render(WAIT));
    assert_eq!(pipeline.stats().frames_published, 2);
}

#[test]
fn test_disabled_pipeline_publishes_nothing() {
    let mut pipeline = VideoPipeline::new(
        VideoFormat::new(PixelFormat::Rgba8, 2, 2),
        &VideoConfig::default(),
    )
    .unwrap();
    pipeline.set_enabled(false);
    write_frame(&mut pipeline, 1);
    assert_eq!(pipeline.stats(), VideoStats::default());
}

#[test]
fn test_viewport_and_scale_applied_on_render() {
    let config = VideoConfig {
        scale: 2,
        ..VideoConfig::default()
    };
    let mut pipeline =
        VideoPipeline::new(VideoFormat::new(PixelFormat::Rgb565, 4, 4), &config).unwrap();
    let presenter = RecordingPresenter::default();
    pipeline.set_presenter(Box::new(presenter.clone()));
    pipeline.set_viewport(Some(Viewport::new(1, 1, 2, 3)));

    write_frame(&mut pipeline, 0);
    assert!(pipeline.wait_for_render(WAIT));

    let frames = presenter.frames();
    assert_eq!((frames[0].width, frames[0].height), (4, 6));
    assert_eq!(frames[0].pixel_format, PixelFormat::Bgra8);
    assert_eq!(frames[0].pixel(0, 0), [0, 0, 0, 255]);
}

#[test]
fn test_presenter_errors_are_counted() {
    let mut pipeline = VideoPipeline::new(
        VideoFormat::new(PixelFormat::Bgra8, 1, 1),
        &VideoConfig::default(),
    )
    .unwrap();
    pipeline.set_presenter(Box::new(FailingPresenter));
    write_frame(&mut pipeline, 1);
    assert!(pipeline.wait_for_render(WAIT));
    assert_eq!(pipeline.stats().render_errors, 1);
    assert_eq!(pipeline.stats().frames_presented, 0);
}

#[test]
fn test_render_thread_cancel_wakes_idle_thread() {
    let mut thread = RenderThread::spawn("render-test", || {}).unwrap();
    assert!(thread.is_alive());
    thread.cancel();
    assert!(!thread.is_alive());
}
