use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::camera::{
    BitDepth, CameraSession, FlipMode, Frame, ImageFormat, SimulatedCamera, SimulatedCapture,
};
use crate::capture::{Interrupt, RetryPolicy};
use crate::common::error::{DarkFrameError, Result};
use crate::config::{GainRange, RunConfig};
use crate::output::{ImageWriter, OutputFormat, OutputOptions};
use crate::sweep::{SweepDriver, SweepPlan};

struct MockWriter {
    should_fail: bool,
    written_data: Arc<Mutex<Vec<Frame>>>,
}

impl ImageWriter for MockWriter {
    fn write_image(
        &self,
        image: &Frame,
        _format: OutputFormat,
        output: &mut dyn Write,
        _options: &OutputOptions,
    ) -> Result<()> {
        if self.should_fail {
            return Err(DarkFrameError::EncodeError("Mock encode error".to_string()));
        }
        self.written_data.lock().unwrap().push(image.clone());
        output.write_all(b"mock")?;
        Ok(())
    }
}

fn run_config(directory: PathBuf, gain: &str, exposure: &str, stack: u32) -> RunConfig {
    RunConfig {
        camera_index: None,
        info_only: false,
        directory,
        template: "dark_{exps}s_{gain:03d}g_{temp:02d}C.png".parse().unwrap(),
        bit_depth: Some(BitDepth::Mono8),
        gain: gain.parse().unwrap(),
        exposure: exposure.parse().unwrap(),
        binning: 1,
        stack,
        flip: None,
        offset: 0,
        wb_r: None,
        wb_b: None,
        output: OutputOptions::default(),
        retry: RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(1),
            deadline_margin: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
        },
        warmup_frames: 0,
        verbose: false,
    }
}

fn mock_driver(
    camera: SimulatedCamera,
    config: RunConfig,
) -> (SweepDriver<SimulatedCamera, MockWriter>, Arc<Mutex<Vec<Frame>>>) {
    let written = Arc::new(Mutex::new(Vec::new()));
    let writer = MockWriter {
        should_fail: false,
        written_data: written.clone(),
    };
    let session = CameraSession::open(camera).unwrap();
    (
        SweepDriver::with_custom(session, writer, config, Interrupt::new()),
        written,
    )
}

#[test]
fn test_grid_sweep_writes_one_file_per_point() {
    let dir = tempfile::tempdir().unwrap();
    let camera = SimulatedCamera::mono("ZWO ASI120MM Mini");
    let shared = camera.shared_log();
    let session = CameraSession::open(camera).unwrap();
    let config = run_config(dir.path().to_path_buf(), "10:30:10", "2:4:2", 1);
    let mut driver = SweepDriver::new(session, config, Interrupt::new());

    let plan = driver.prepare().unwrap();
    let report = driver.run(&plan).unwrap();

    assert_eq!(shared.lock().unwrap().captures.len(), 6);
    assert_eq!(report.files.len(), 6);
    assert!(report.files.iter().all(|f| f.exists()));
    assert_eq!(report.files[0], dir.path().join("dark_2s_010g_25C.png"));
    assert_eq!(report.files[5], dir.path().join("dark_4s_030g_25C.png"));

    let log = shared.lock().unwrap();
    let captures = &log.captures;
    assert_eq!((captures[0].gain, captures[0].exposure_us), (10, 2_000_000));
    assert_eq!((captures[3].gain, captures[3].exposure_us), (10, 4_000_000));
    assert!(captures.iter().all(|c| c.format == ImageFormat::Raw8));
}

#[test]
fn test_stacked_frames_are_averaged() {
    let camera = SimulatedCamera::mono("sim").with_pixel_values(vec![10, 20, 30]);
    let dir = tempfile::tempdir().unwrap();
    let (mut driver, written) =
        mock_driver(camera, run_config(dir.path().to_path_buf(), "0:0:1", "1:1:1", 3));

    let plan = driver.prepare().unwrap();
    driver.run(&plan).unwrap();

    let frames = written.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].data.iter().all(|&v| v == 20));
}

#[test]
fn test_temperature_label_uses_rounded_mean() {
    // stack of 2 gives 3 samples: (-39.9 - 40.0 - 40.2) / 3 = -40.03
    let camera = SimulatedCamera::mono("sim").with_temperatures(vec![-399, -400, -402]);
    let dir = tempfile::tempdir().unwrap();
    let (mut driver, _) =
        mock_driver(camera, run_config(dir.path().to_path_buf(), "5:5:1", "3:3:1", 2));

    let plan = driver.prepare().unwrap();
    let report = driver.run(&plan).unwrap();

    assert_eq!(report.files, vec![dir.path().join("dark_3s_005g_-40C.png")]);
}

#[test]
fn test_interrupt_stops_stream_and_skips_file() {
    let interrupt = Interrupt::new();
    let camera = SimulatedCamera::mono("sim").with_script(vec![
        SimulatedCapture::Frame,
        SimulatedCapture::Interrupt(interrupt.clone()),
    ]);
    let shared = camera.shared_log();
    let dir = tempfile::tempdir().unwrap();
    let session = CameraSession::open(camera).unwrap();
    let config = run_config(dir.path().to_path_buf(), "10:20:10", "2:2:1", 1);
    let mut driver = SweepDriver::new(session, config, interrupt);

    let plan = driver.prepare().unwrap();
    let result = driver.run(&plan);

    assert!(matches!(result, Err(DarkFrameError::Interrupted)));
    assert!(!shared.lock().unwrap().streaming);
    assert!(!shared.lock().unwrap().exposing);
    assert!(dir.path().join("dark_2s_010g_25C.png").exists());
    assert!(!dir.path().join("dark_2s_020g_25C.png").exists());
}

#[test]
fn test_existing_file_is_replaced_and_directories_created() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("darks").join("tonight");
    let camera = SimulatedCamera::mono("sim").with_pixel_values(vec![7]);
    let session = CameraSession::open(camera).unwrap();
    let mut config = run_config(dir.path().to_path_buf(), "0:0:1", "1:1:1", 1);
    config.template = "darks/tonight/{model}_{gain}_{expms}ms.png".parse().unwrap();
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(nested.join("sim_0_1000ms.png"), b"stale").unwrap();

    let mut driver = SweepDriver::new(session, config, Interrupt::new());
    let plan = driver.prepare().unwrap();
    let report = driver.run(&plan).unwrap();

    let bytes = std::fs::read(&report.files[0]).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap().to_luma8();
    assert!(decoded.pixels().all(|p| p.0[0] == 7));
}

#[test]
fn test_configuration_reaches_camera() {
    let camera = SimulatedCamera::color("sim");
    let dir = tempfile::tempdir().unwrap();
    let mut config = run_config(dir.path().to_path_buf(), "50:50:1", "1:1:1", 1);
    config.bit_depth = Some(BitDepth::Color24);
    config.flip = Some(FlipMode::Horizontal);
    config.wb_r = Some(40);
    config.wb_b = Some(60);
    config.offset = 12;
    config.binning = 2;
    let (mut driver, written) = mock_driver(camera, config);

    let plan = driver.prepare().unwrap();
    driver.run(&plan).unwrap();

    let settings = driver.session().settings();
    assert_eq!(settings.flip, FlipMode::Horizontal);
    assert_eq!((settings.wb_r, settings.wb_b), (Some(40), Some(60)));
    assert_eq!(settings.offset, Some(12));
    assert_eq!(settings.roi.binning, 2);
    let frames = written.lock().unwrap();
    assert_eq!((frames[0].width, frames[0].height), (32, 24));
    assert_eq!(frames[0].format, ImageFormat::Rgb24);
}

#[test]
fn test_unsupported_options_fail_before_capture() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = run_config(dir.path().to_path_buf(), "0:0:1", "1:1:1", 1);
    config.binning = 3;
    let (driver, _) = mock_driver(SimulatedCamera::mono("sim"), config);
    assert!(matches!(
        driver.prepare(),
        Err(DarkFrameError::UnsupportedBinning { requested: 3, .. })
    ));

    let mut config = run_config(dir.path().to_path_buf(), "0:0:1", "1:1:1", 1);
    config.bit_depth = Some(BitDepth::Color24);
    let (driver, _) = mock_driver(SimulatedCamera::mono("sim"), config);
    assert!(matches!(driver.prepare(), Err(DarkFrameError::UnsupportedFormat(_))));

    let mut config = run_config(dir.path().to_path_buf(), "0:0:1", "1:1:1", 1);
    config.template = "dark_{gain}.fits".parse().unwrap();
    let (driver, _) = mock_driver(SimulatedCamera::mono("sim"), config);
    assert!(matches!(driver.prepare(), Err(DarkFrameError::UnsupportedFormat(_))));

    assert!(driver.session().camera().log().captures.is_empty());
}

#[test]
fn test_auto_gain_plan_from_camera_range() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = run_config(dir.path().to_path_buf(), "0:0:1", "1:1:1", 1);
    config.gain = GainRange::auto();
    let (driver, _) = mock_driver(SimulatedCamera::mono("sim"), config);

    let plan: SweepPlan = driver.prepare().unwrap();
    assert_eq!(plan.gains().first(), Some(&100));
    assert_eq!(plan.gains().last(), Some(&300));
}

#[test]
fn test_warm_up_discards_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = run_config(dir.path().to_path_buf(), "0:0:1", "1:1:1", 1);
    config.warmup_frames = 5;
    let (mut driver, written) = mock_driver(SimulatedCamera::mono("sim"), config);

    driver.warm_up().unwrap();

    assert_eq!(driver.session().camera().log().captures.len(), 5);
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_writer_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let writer = MockWriter {
        should_fail: true,
        written_data: Arc::new(Mutex::new(Vec::new())),
    };
    let session = CameraSession::open(SimulatedCamera::mono("sim")).unwrap();
    let config = run_config(dir.path().to_path_buf(), "0:0:1", "1:1:1", 1);
    let mut driver = SweepDriver::with_custom(session, writer, config, Interrupt::new());

    let plan = driver.prepare().unwrap();
    let result = driver.run(&plan);

    assert!(matches!(result, Err(DarkFrameError::EncodeError(_))));
    assert!(!dir.path().join("dark_1s_000g_25C.png").exists());
}
