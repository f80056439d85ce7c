//! ZWO ASI camera SDK binding.
//!
//! `libASICamera2` is loaded at runtime from a user-supplied path so the tool
//! builds without the vendor SDK installed. Only the calls the capture sweep
//! needs are resolved.

use std::ffi::{c_char, c_int, c_long, c_uchar};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use libloading::Library;
use tracing::{debug, warn};

use crate::camera::device::{CameraDevice, CameraProvider};
use crate::camera::types::{CameraInfo, ControlCaps, ControlKind, Frame, ImageFormat, Roi};
use crate::common::error::{DarkFrameError, Result};

const ASI_SUCCESS: c_int = 0;
const ASI_ERROR_TIMEOUT: c_int = 11;
const ASI_IMG_END: c_int = -1;

#[repr(C)]
#[allow(dead_code)]
struct AsiCameraInfo {
    name: [c_char; 64],
    camera_id: c_int,
    max_height: c_long,
    max_width: c_long,
    is_color_cam: c_int,
    bayer_pattern: c_int,
    supported_bins: [c_int; 16],
    supported_video_format: [c_int; 8],
    pixel_size: f64,
    mechanical_shutter: c_int,
    st4_port: c_int,
    is_cooler_cam: c_int,
    is_usb3_host: c_int,
    is_usb3_camera: c_int,
    elec_per_adu: f32,
    bit_depth: c_int,
    is_trigger_cam: c_int,
    unused: [c_char; 16],
}

#[repr(C)]
#[allow(dead_code)]
struct AsiControlCaps {
    name: [c_char; 64],
    description: [c_char; 128],
    max_value: c_long,
    min_value: c_long,
    default_value: c_long,
    is_auto_supported: c_int,
    is_writable: c_int,
    control_type: c_int,
    unused: [c_char; 32],
}

type GetNumFn = unsafe extern "C" fn() -> c_int;
type GetPropertyFn = unsafe extern "C" fn(*mut AsiCameraInfo, c_int) -> c_int;
type CameraFn = unsafe extern "C" fn(c_int) -> c_int;
type GetNumControlsFn = unsafe extern "C" fn(c_int, *mut c_int) -> c_int;
type GetControlCapsFn = unsafe extern "C" fn(c_int, c_int, *mut AsiControlCaps) -> c_int;
type GetControlValueFn = unsafe extern "C" fn(c_int, c_int, *mut c_long, *mut c_int) -> c_int;
type SetControlValueFn = unsafe extern "C" fn(c_int, c_int, c_long, c_int) -> c_int;
type SetRoiFormatFn = unsafe extern "C" fn(c_int, c_int, c_int, c_int, c_int) -> c_int;
type SetStartPosFn = unsafe extern "C" fn(c_int, c_int, c_int) -> c_int;
type GetVideoDataFn = unsafe extern "C" fn(c_int, *mut c_uchar, c_long, c_int) -> c_int;

/// Resolved SDK entry points. The library handle outlives every pointer taken from it.
struct AsiApi {
    get_num_cameras: GetNumFn,
    get_camera_property: GetPropertyFn,
    open_camera: CameraFn,
    init_camera: CameraFn,
    close_camera: CameraFn,
    get_num_controls: GetNumControlsFn,
    get_control_caps: GetControlCapsFn,
    get_control_value: GetControlValueFn,
    set_control_value: SetControlValueFn,
    set_roi_format: SetRoiFormatFn,
    set_start_pos: SetStartPosFn,
    start_video_capture: CameraFn,
    stop_video_capture: CameraFn,
    stop_exposure: CameraFn,
    get_video_data: GetVideoDataFn,
    _library: Option<Library>,
}

unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T> {
    let symbol = unsafe { library.get::<T>(name) }.map_err(|e| {
        let name = String::from_utf8_lossy(name);
        DarkFrameError::SdkLoad(format!("{}: {e}", name.trim_end_matches('\0')))
    })?;
    Ok(*symbol)
}

impl AsiApi {
    fn load(path: &Path) -> Result<Self> {
        debug!("Loading camera SDK from {}", path.display());
        // SAFETY: the SDK's initialisers have no preconditions; the handle is stored
        // alongside the function pointers so they never dangle.
        let library = unsafe { Library::new(path) }
            .map_err(|e| DarkFrameError::SdkLoad(format!("{}: {e}", path.display())))?;

        // SAFETY: the signatures match the declarations in ASICamera2.h.
        unsafe {
            Ok(Self {
                get_num_cameras: symbol(&library, b"ASIGetNumOfConnectedCameras\0")?,
                get_camera_property: symbol(&library, b"ASIGetCameraProperty\0")?,
                open_camera: symbol(&library, b"ASIOpenCamera\0")?,
                init_camera: symbol(&library, b"ASIInitCamera\0")?,
                close_camera: symbol(&library, b"ASICloseCamera\0")?,
                get_num_controls: symbol(&library, b"ASIGetNumOfControls\0")?,
                get_control_caps: symbol(&library, b"ASIGetControlCaps\0")?,
                get_control_value: symbol(&library, b"ASIGetControlValue\0")?,
                set_control_value: symbol(&library, b"ASISetControlValue\0")?,
                set_roi_format: symbol(&library, b"ASISetROIFormat\0")?,
                set_start_pos: symbol(&library, b"ASISetStartPos\0")?,
                start_video_capture: symbol(&library, b"ASIStartVideoCapture\0")?,
                stop_video_capture: symbol(&library, b"ASIStopVideoCapture\0")?,
                stop_exposure: symbol(&library, b"ASIStopExposure\0")?,
                get_video_data: symbol(&library, b"ASIGetVideoData\0")?,
                _library: Some(library),
            })
        }
    }

    fn camera_property(&self, index: usize) -> Result<AsiCameraInfo> {
        // SAFETY: AsiCameraInfo is plain integers, floats and arrays of them.
        let mut raw: AsiCameraInfo = unsafe { std::mem::zeroed() };
        // SAFETY: `raw` is a valid, writable ASI_CAMERA_INFO.
        check(
            unsafe { (self.get_camera_property)(&mut raw, index as c_int) },
            "get_camera_property",
        )?;
        Ok(raw)
    }
}

fn error_name(code: c_int) -> &'static str {
    match code {
        1 => "ASI_ERROR_INVALID_INDEX",
        2 => "ASI_ERROR_INVALID_ID",
        3 => "ASI_ERROR_INVALID_CONTROL_TYPE",
        4 => "ASI_ERROR_CAMERA_CLOSED",
        5 => "ASI_ERROR_CAMERA_REMOVED",
        6 => "ASI_ERROR_INVALID_PATH",
        7 => "ASI_ERROR_INVALID_FILEFORMAT",
        8 => "ASI_ERROR_INVALID_SIZE",
        9 => "ASI_ERROR_INVALID_IMGTYPE",
        10 => "ASI_ERROR_OUTOF_BOUNDARY",
        11 => "ASI_ERROR_TIMEOUT",
        12 => "ASI_ERROR_INVALID_SEQUENCE",
        13 => "ASI_ERROR_BUFFER_TOO_SMALL",
        14 => "ASI_ERROR_VIDEO_MODE_ACTIVE",
        15 => "ASI_ERROR_EXPOSURE_IN_PROGRESS",
        16 => "ASI_ERROR_GENERAL_ERROR",
        _ => "ASI_ERROR_UNKNOWN",
    }
}

fn check(code: c_int, operation: &'static str) -> Result<()> {
    if code == ASI_SUCCESS {
        Ok(())
    } else {
        Err(DarkFrameError::camera(operation, error_name(code)))
    }
}

fn c_string(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn camera_info(raw: &AsiCameraInfo) -> CameraInfo {
    CameraInfo {
        name: c_string(&raw.name),
        camera_id: raw.camera_id,
        max_width: raw.max_width.max(0) as usize,
        max_height: raw.max_height.max(0) as usize,
        is_color: raw.is_color_cam != 0,
        supported_bins: raw
            .supported_bins
            .iter()
            .take_while(|&&bin| bin != 0)
            .map(|&bin| bin as u32)
            .collect(),
        supported_formats: raw
            .supported_video_format
            .iter()
            .take_while(|&&format| format != ASI_IMG_END)
            .filter_map(|&format| ImageFormat::from_sdk_id(format))
            .collect(),
        pixel_size_um: raw.pixel_size,
        is_cooler_cam: raw.is_cooler_cam != 0,
        is_usb3_camera: raw.is_usb3_camera != 0,
        elec_per_adu: raw.elec_per_adu,
        bit_depth: raw.bit_depth.max(0) as u32,
    }
}

/// Converts an SDK video buffer into samples. RGB24 arrives as BGR.
pub fn decode_frame(bytes: &[u8], width: usize, height: usize, format: ImageFormat) -> Result<Frame> {
    let expected = width * height * format.bytes_per_pixel();
    if bytes.len() < expected {
        return Err(DarkFrameError::InvalidDimensions(width, height));
    }
    let bytes = &bytes[..expected];

    let data = match format {
        ImageFormat::Raw8 | ImageFormat::Y8 => bytes.iter().map(|&b| b as u16).collect(),
        ImageFormat::Raw16 => bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
        ImageFormat::Rgb24 => bytes
            .chunks_exact(3)
            .flat_map(|bgr| [bgr[2] as u16, bgr[1] as u16, bgr[0] as u16])
            .collect(),
    };

    Ok(Frame {
        width,
        height,
        format,
        data,
    })
}

/// Entry point into the vendor SDK.
pub struct AsiSdk {
    api: Arc<AsiApi>,
}

impl AsiSdk {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            api: Arc::new(AsiApi::load(path.as_ref())?),
        })
    }
}

impl CameraProvider for AsiSdk {
    type Camera = AsiCamera;

    fn cameras(&self) -> Result<Vec<String>> {
        // SAFETY: takes no arguments.
        let count = unsafe { (self.api.get_num_cameras)() }.max(0) as usize;
        (0..count)
            .map(|index| Ok(c_string(&self.api.camera_property(index)?.name)))
            .collect()
    }

    fn open(&self, index: usize) -> Result<AsiCamera> {
        let raw = self.api.camera_property(index)?;
        let id = raw.camera_id;
        let info = camera_info(&raw);

        // SAFETY: `id` was reported by the SDK for this index.
        check(unsafe { (self.api.open_camera)(id) }, "open_camera")?;

        // From here on the handle owns the open camera and closes it on drop,
        // including when the remaining setup fails.
        let roi = Roi::full_frame(&info, 1);
        let mut camera = AsiCamera {
            api: self.api.clone(),
            id,
            info,
            controls: Vec::new(),
            roi,
            format: ImageFormat::Raw8,
            buffer: Vec::new(),
        };
        camera.call(self.api.init_camera, "init_camera")?;
        camera.controls = camera.read_controls()?;

        debug!(camera = %camera.info.name, controls = camera.controls.len(), "Opened camera");
        Ok(camera)
    }
}

/// An open ASI camera, closed on drop.
pub struct AsiCamera {
    api: Arc<AsiApi>,
    id: c_int,
    info: CameraInfo,
    controls: Vec<ControlCaps>,
    roi: Roi,
    format: ImageFormat,
    buffer: Vec<u8>,
}

impl AsiCamera {
    fn call(&self, f: CameraFn, operation: &'static str) -> Result<()> {
        // SAFETY: `self.id` refers to a camera opened by this handle.
        check(unsafe { f(self.id) }, operation)
    }

    fn read_controls(&self) -> Result<Vec<ControlCaps>> {
        let mut count: c_int = 0;
        // SAFETY: `count` is a valid out-pointer.
        check(
            unsafe { (self.api.get_num_controls)(self.id, &mut count) },
            "get_num_controls",
        )?;

        let mut controls = Vec::with_capacity(count.max(0) as usize);
        for control in 0..count {
            // SAFETY: AsiControlCaps is plain integers and arrays of them.
            let mut caps: AsiControlCaps = unsafe { std::mem::zeroed() };
            // SAFETY: `caps` is a valid out-pointer.
            check(
                unsafe { (self.api.get_control_caps)(self.id, control, &mut caps) },
                "get_control_caps",
            )?;
            controls.push(ControlCaps {
                name: c_string(&caps.name),
                description: c_string(&caps.description),
                min_value: caps.min_value as i64,
                max_value: caps.max_value as i64,
                default_value: caps.default_value as i64,
                is_auto_supported: caps.is_auto_supported != 0,
                is_writable: caps.is_writable != 0,
                control_type: caps.control_type,
            });
        }
        Ok(controls)
    }
}

impl CameraDevice for AsiCamera {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn controls(&self) -> &[ControlCaps] {
        &self.controls
    }

    fn get_control(&mut self, kind: ControlKind) -> Result<i64> {
        let mut value: c_long = 0;
        let mut auto: c_int = 0;
        // SAFETY: both out-pointers are valid for the duration of the call.
        check(
            unsafe { (self.api.get_control_value)(self.id, kind.sdk_id(), &mut value, &mut auto) },
            "get_control_value",
        )?;
        Ok(value as i64)
    }

    fn set_control(&mut self, kind: ControlKind, value: i64) -> Result<()> {
        // SAFETY: plain value arguments.
        check(
            unsafe { (self.api.set_control_value)(self.id, kind.sdk_id(), value as c_long, 0) },
            "set_control_value",
        )
    }

    fn set_roi(&mut self, roi: Roi, format: ImageFormat) -> Result<Roi> {
        let roi = roi.aligned();
        // SAFETY: plain value arguments.
        unsafe {
            check(
                (self.api.set_roi_format)(
                    self.id,
                    roi.width as c_int,
                    roi.height as c_int,
                    roi.binning as c_int,
                    format.sdk_id(),
                ),
                "set_roi_format",
            )?;
            check(
                (self.api.set_start_pos)(self.id, roi.start_x as c_int, roi.start_y as c_int),
                "set_start_pos",
            )?;
        }
        self.roi = roi;
        self.format = format;
        self.buffer = vec![0; roi.width * roi.height * format.bytes_per_pixel()];
        Ok(roi)
    }

    fn start_video(&mut self) -> Result<()> {
        self.call(self.api.start_video_capture, "start_video_capture")
    }

    fn stop_video(&mut self) -> Result<()> {
        self.call(self.api.stop_video_capture, "stop_video_capture")
    }

    fn stop_exposure(&mut self) -> Result<()> {
        self.call(self.api.stop_exposure, "stop_exposure")
    }

    fn capture_frame(&mut self, wait: Duration) -> Result<Option<Frame>> {
        let wait_ms = wait.as_millis().clamp(1, c_int::MAX as u128) as c_int;
        // SAFETY: the buffer is sized for the current ROI and format.
        let code = unsafe {
            (self.api.get_video_data)(
                self.id,
                self.buffer.as_mut_ptr(),
                self.buffer.len() as c_long,
                wait_ms,
            )
        };
        if code == ASI_ERROR_TIMEOUT {
            return Ok(None);
        }
        check(code, "get_video_data")?;
        decode_frame(&self.buffer, self.roi.width, self.roi.height, self.format).map(Some)
    }
}

impl Drop for AsiCamera {
    fn drop(&mut self) {
        if let Err(e) = self.call(self.api.close_camera, "close_camera") {
            warn!("Failed to close camera {}: {}", self.info.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_decode_rgb24_swaps_bgr() {
        let bytes = [1u8, 2, 3, 10, 20, 30];
        let frame = decode_frame(&bytes, 2, 1, ImageFormat::Rgb24).unwrap();
        assert_eq!(frame.data, vec![3, 2, 1, 30, 20, 10]);
    }

    #[test]
    fn test_decode_raw16_is_little_endian() {
        let bytes = [0x34u8, 0x12, 0xff, 0x00];
        let frame = decode_frame(&bytes, 2, 1, ImageFormat::Raw16).unwrap();
        assert_eq!(frame.data, vec![0x1234, 0x00ff]);
    }

    #[test]
    fn test_decode_short_buffer_fails() {
        let result = decode_frame(&[0u8; 3], 2, 2, ImageFormat::Raw8);
        assert!(matches!(result, Err(DarkFrameError::InvalidDimensions(2, 2))));
    }

    #[test]
    fn test_error_names() {
        assert_eq!(error_name(ASI_ERROR_TIMEOUT), "ASI_ERROR_TIMEOUT");
        assert!(check(16, "capture").unwrap_err().to_string().contains("ASI_ERROR_GENERAL_ERROR"));
        assert!(check(ASI_SUCCESS, "capture").is_ok());
    }

    #[test]
    fn test_c_string_stops_at_nul() {
        let mut raw = [0 as c_char; 8];
        for (slot, byte) in raw.iter_mut().zip(b"ASI120") {
            *slot = *byte as c_char;
        }
        assert_eq!(c_string(&raw), "ASI120");
    }

    static INIT_CODE: AtomicI32 = AtomicI32::new(ASI_SUCCESS);
    static CLOSED: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn one_camera() -> c_int {
        1
    }

    extern "C" fn small_sensor(info: *mut AsiCameraInfo, _index: c_int) -> c_int {
        // SAFETY: callers pass a valid ASI_CAMERA_INFO.
        unsafe {
            (*info).max_width = 64;
            (*info).max_height = 48;
        }
        ASI_SUCCESS
    }

    extern "C" fn succeed(_id: c_int) -> c_int {
        ASI_SUCCESS
    }

    extern "C" fn init(_id: c_int) -> c_int {
        INIT_CODE.load(Ordering::SeqCst)
    }

    extern "C" fn close(_id: c_int) -> c_int {
        CLOSED.fetch_add(1, Ordering::SeqCst);
        ASI_SUCCESS
    }

    extern "C" fn no_controls(_id: c_int, count: *mut c_int) -> c_int {
        // SAFETY: callers pass a valid out-pointer.
        unsafe { *count = 0 };
        ASI_SUCCESS
    }

    extern "C" fn control_caps(_id: c_int, _index: c_int, _caps: *mut AsiControlCaps) -> c_int {
        ASI_SUCCESS
    }

    extern "C" fn control_value(_id: c_int, _kind: c_int, _value: *mut c_long, _auto: *mut c_int) -> c_int {
        ASI_SUCCESS
    }

    extern "C" fn set_value(_id: c_int, _kind: c_int, _value: c_long, _auto: c_int) -> c_int {
        ASI_SUCCESS
    }

    extern "C" fn roi_format(_id: c_int, _w: c_int, _h: c_int, _bin: c_int, _fmt: c_int) -> c_int {
        ASI_SUCCESS
    }

    extern "C" fn start_pos(_id: c_int, _x: c_int, _y: c_int) -> c_int {
        ASI_SUCCESS
    }

    extern "C" fn video_data(_id: c_int, _buf: *mut c_uchar, _len: c_long, _wait: c_int) -> c_int {
        ASI_ERROR_TIMEOUT
    }

    fn fake_sdk() -> AsiSdk {
        AsiSdk {
            api: Arc::new(AsiApi {
                get_num_cameras: one_camera,
                get_camera_property: small_sensor,
                open_camera: succeed,
                init_camera: init,
                close_camera: close,
                get_num_controls: no_controls,
                get_control_caps: control_caps,
                get_control_value: control_value,
                set_control_value: set_value,
                set_roi_format: roi_format,
                set_start_pos: start_pos,
                start_video_capture: succeed,
                stop_video_capture: succeed,
                stop_exposure: succeed,
                get_video_data: video_data,
                _library: None,
            }),
        }
    }

    #[test]
    fn test_failed_init_closes_opened_camera() {
        let sdk = fake_sdk();

        INIT_CODE.store(16, Ordering::SeqCst);
        let result = sdk.open(0);
        assert!(matches!(result, Err(DarkFrameError::Camera { .. })));
        assert_eq!(CLOSED.load(Ordering::SeqCst), 1);

        INIT_CODE.store(ASI_SUCCESS, Ordering::SeqCst);
        let mut camera = sdk.open(0).unwrap();
        assert_eq!(CLOSED.load(Ordering::SeqCst), 1);
        let roi = Roi::full_frame(camera.info(), 1);
        assert_eq!(camera.set_roi(roi, ImageFormat::Raw8).unwrap().width, 64);
        assert!(camera.capture_frame(Duration::from_millis(1)).unwrap().is_none());
        drop(camera);
        assert_eq!(CLOSED.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_library_is_reported() {
        let result = AsiSdk::load("/nonexistent/libASICamera2.so");
        assert!(matches!(result, Err(DarkFrameError::SdkLoad(_))));
    }
}
