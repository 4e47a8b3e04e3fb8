//! ZKTeco ZKFinger SDK binding.
//!
//! The vendor library (`libzkfp.so`) is loaded at runtime with `dlopen`
//! so the binary builds and starts on machines without the SDK; a missing
//! library surfaces as an `init` failure instead of a link error.

use crate::sdk::{DeviceGeometry, FingerprintSdk, Light, SdkError};
use libc::{c_int, c_uchar, c_uint, c_void};
use std::ffi::{CStr, CString};
use std::time::Duration;

/// Library name resolved through the dynamic loader search path.
pub const DEFAULT_LIBRARY: &str = "libzkfp.so";

/// `ZKFPM_GetParameters` codes for the frame geometry.
const PARAM_IMAGE_WIDTH: c_int = 1;
const PARAM_IMAGE_HEIGHT: c_int = 2;

/// `ZKFPM_SetParameters` codes for the indicator LEDs (1 = on, 0 = off).
const PARAM_LED_GREEN: c_int = 101;
const PARAM_LED_RED: c_int = 102;

/// How long a light stays on before it is switched back off.
const LIGHT_PULSE: Duration = Duration::from_millis(500);

const ZKFP_ERR_OK: c_int = 0;
/// Returned by `ZKFPM_AcquireFingerprintImage` while no finger is present.
const ZKFP_ERR_CAPTURE: c_int = -8;
const ZKFP_ERR_ALREADY_INIT: c_int = -25;

type Handle = *mut c_void;

/// Human-readable name for a `ZKFP_ERR_*` code.
pub fn error_name(code: i32) -> &'static str {
    match code {
        0 => "ZKFP_ERR_OK",
        -1 => "ZKFP_ERR_INITLIB",
        -2 => "ZKFP_ERR_INIT",
        -3 => "ZKFP_ERR_NO_DEVICE",
        -4 => "ZKFP_ERR_NOT_SUPPORT",
        -5 => "ZKFP_ERR_INVALID_PARAM",
        -6 => "ZKFP_ERR_OPEN",
        -7 => "ZKFP_ERR_INVALID_HANDLE",
        -8 => "ZKFP_ERR_CAPTURE",
        -9 => "ZKFP_ERR_EXTRACT_FP",
        -10 => "ZKFP_ERR_ABSORT",
        -11 => "ZKFP_ERR_MEMORY_NOT_ENOUGH",
        -12 => "ZKFP_ERR_BUSY",
        -13 => "ZKFP_ERR_ADD_FINGER",
        -14 => "ZKFP_ERR_DEL_FINGER",
        -17 => "ZKFP_ERR_FAIL",
        -18 => "ZKFP_ERR_CANCEL",
        -20 => "ZKFP_ERR_VERIFY_FP",
        -22 => "ZKFP_ERR_MERGE",
        -23 => "ZKFP_ERR_NOT_OPENED",
        -24 => "ZKFP_ERR_NOT_INIT",
        -25 => "ZKFP_ERR_ALREADY_INIT",
        _ => "ZKFP_ERR_UNKNOWN",
    }
}

fn check(call: &'static str, code: c_int) -> Result<(), SdkError> {
    if code == ZKFP_ERR_OK {
        Ok(())
    } else {
        Err(SdkError::Call {
            call,
            code,
            name: error_name(code),
        })
    }
}

/// A `dlopen`ed shared object, closed on drop.
struct Library {
    handle: *mut c_void,
}

impl Library {
    fn open(path: &str) -> Result<Self, SdkError> {
        let c_path = CString::new(path).map_err(|e| SdkError::LibraryLoad {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(SdkError::LibraryLoad {
                path: path.to_string(),
                reason: last_dl_error(),
            });
        }
        Ok(Self { handle })
    }

    /// Resolve the first of `names` that the library exports.
    ///
    /// # Safety
    ///
    /// `T` must be an `extern "C"` function pointer type matching the
    /// exported symbol's real signature.
    unsafe fn symbol<T: Copy>(&self, names: &[&'static str]) -> Result<T, SdkError> {
        const _: () = assert!(std::mem::size_of::<fn()>() == std::mem::size_of::<*mut c_void>());
        assert_eq!(std::mem::size_of::<T>(), std::mem::size_of::<*mut c_void>());

        for name in names {
            let Ok(c_name) = CString::new(*name) else {
                continue;
            };
            let ptr = libc::dlsym(self.handle, c_name.as_ptr());
            if !ptr.is_null() {
                return Ok(std::mem::transmute_copy::<*mut c_void, T>(&ptr));
            }
        }
        Err(SdkError::MissingSymbol(names.join(" / ")))
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        // SAFETY: `handle` came from a successful `dlopen` and is closed once.
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

fn last_dl_error() -> String {
    // SAFETY: `dlerror` returns null or a pointer to a NUL-terminated
    // thread-local string that stays valid until the next dl* call.
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown dynamic loader error".to_string()
        } else {
            CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}

/// Resolved ZKFinger entry points. `_lib` keeps the code mapped.
struct Api {
    init: unsafe extern "C" fn() -> c_int,
    terminate: unsafe extern "C" fn() -> c_int,
    get_device_count: unsafe extern "C" fn() -> c_int,
    open_device: unsafe extern "C" fn(c_int) -> Handle,
    close_device: unsafe extern "C" fn(Handle) -> c_int,
    get_parameters: unsafe extern "C" fn(Handle, c_int, *mut c_uchar, *mut c_uint) -> c_int,
    set_parameters: unsafe extern "C" fn(Handle, c_int, *mut c_uchar, c_uint) -> c_int,
    acquire_image: unsafe extern "C" fn(Handle, *mut c_uchar, c_uint) -> c_int,
    db_init: unsafe extern "C" fn() -> Handle,
    db_clear: unsafe extern "C" fn(Handle) -> c_int,
    db_free: unsafe extern "C" fn(Handle) -> c_int,
    _lib: Library,
}

impl Api {
    fn load(path: &str) -> Result<Self, SdkError> {
        let lib = Library::open(path)?;

        // SAFETY: each signature mirrors the prototype in `libzkfp.h`.
        // The DB cache calls are exported under two names depending on SDK version.
        unsafe {
            Ok(Self {
                init: lib.symbol(&["ZKFPM_Init"])?,
                terminate: lib.symbol(&["ZKFPM_Terminate"])?,
                get_device_count: lib.symbol(&["ZKFPM_GetDeviceCount"])?,
                open_device: lib.symbol(&["ZKFPM_OpenDevice"])?,
                close_device: lib.symbol(&["ZKFPM_CloseDevice"])?,
                get_parameters: lib.symbol(&["ZKFPM_GetParameters"])?,
                set_parameters: lib.symbol(&["ZKFPM_SetParameters"])?,
                acquire_image: lib.symbol(&["ZKFPM_AcquireFingerprintImage"])?,
                db_init: lib.symbol(&["ZKFPM_CreateDBCache", "ZKFPM_DBInit"])?,
                db_clear: lib.symbol(&["ZKFPM_ClearDBCache", "ZKFPM_DBClear"])?,
                db_free: lib.symbol(&["ZKFPM_CloseDBCache", "ZKFPM_DBFree"])?,
                _lib: lib,
            })
        }
    }

    fn get_param_u32(&self, handle: Handle, code: c_int) -> Result<u32, SdkError> {
        let mut value = [0u8; 4];
        let mut size = value.len() as c_uint;
        // SAFETY: `value` is a 4-byte buffer and `size` tells the SDK its length.
        let ret = unsafe { (self.get_parameters)(handle, code, value.as_mut_ptr(), &mut size) };
        check("ZKFPM_GetParameters", ret)?;
        Ok(u32::from_le_bytes(value))
    }

    fn set_param_u32(&self, handle: Handle, code: c_int, value: u32) -> Result<(), SdkError> {
        let mut bytes = value.to_le_bytes();
        // SAFETY: `bytes` is a live 4-byte buffer for the duration of the call.
        let ret = unsafe {
            (self.set_parameters)(handle, code, bytes.as_mut_ptr(), bytes.len() as c_uint)
        };
        check("ZKFPM_SetParameters", ret)
    }
}

/// An opened sensor and the buffers that belong to it.
struct OpenDevice {
    handle: Handle,
    /// Template DB cache; null if the SDK refused to create one.
    db_cache: Handle,
    geometry: DeviceGeometry,
    image: Vec<u8>,
}

/// [`FingerprintSdk`] backed by the vendor's `libzkfp.so`.
pub struct ZkfpSdk {
    library_path: String,
    api: Option<Api>,
    device: Option<OpenDevice>,
}

impl ZkfpSdk {
    /// Create an unloaded binding; the library is opened by [`FingerprintSdk::init`].
    pub fn new(library_path: impl Into<String>) -> Self {
        Self {
            library_path: library_path.into(),
            api: None,
            device: None,
        }
    }

    pub fn library_path(&self) -> &str {
        &self.library_path
    }

    fn api(&self) -> Result<&Api, SdkError> {
        self.api.as_ref().ok_or(SdkError::NotInitialized)
    }
}

impl Default for ZkfpSdk {
    fn default() -> Self {
        Self::new(DEFAULT_LIBRARY)
    }
}

impl FingerprintSdk for ZkfpSdk {
    fn init(&mut self) -> Result<(), SdkError> {
        if self.api.is_none() {
            let api = Api::load(&self.library_path)?;
            tracing::debug!(library = %self.library_path, "loaded ZKFinger SDK");
            self.api = Some(api);
        }

        let api = self.api()?;
        // SAFETY: no arguments; the SDK tolerates repeated init.
        let ret = unsafe { (api.init)() };
        if ret == ZKFP_ERR_ALREADY_INIT {
            return Ok(());
        }
        check("ZKFPM_Init", ret)
    }

    fn device_count(&mut self) -> Result<usize, SdkError> {
        let api = self.api()?;
        // SAFETY: no arguments.
        let ret = unsafe { (api.get_device_count)() };
        if ret < 0 {
            check("ZKFPM_GetDeviceCount", ret)?;
        }
        Ok(ret as usize)
    }

    fn open_device(&mut self, index: usize) -> Result<DeviceGeometry, SdkError> {
        if let Some(dev) = &self.device {
            return Ok(dev.geometry);
        }

        let api = self.api.as_ref().ok_or(SdkError::NotInitialized)?;
        // SAFETY: index is a plain integer; a null return means failure.
        let handle = unsafe { (api.open_device)(index as c_int) };
        if handle.is_null() {
            return Err(SdkError::Call {
                call: "ZKFPM_OpenDevice",
                code: -6,
                name: error_name(-6),
            });
        }

        let geometry = match (
            api.get_param_u32(handle, PARAM_IMAGE_WIDTH),
            api.get_param_u32(handle, PARAM_IMAGE_HEIGHT),
        ) {
            (Ok(width), Ok(height)) => DeviceGeometry { width, height },
            (Err(e), _) | (_, Err(e)) => {
                // SAFETY: `handle` is the live handle opened above.
                unsafe { (api.close_device)(handle) };
                return Err(e);
            }
        };

        // SAFETY: no arguments; a null return means no cache is available.
        let db_cache = unsafe { (api.db_init)() };
        if db_cache.is_null() {
            tracing::warn!("ZKFinger DB cache could not be created");
        }

        tracing::info!(
            index,
            width = geometry.width,
            height = geometry.height,
            "opened fingerprint sensor"
        );

        self.device = Some(OpenDevice {
            handle,
            db_cache,
            geometry,
            image: vec![0u8; geometry.frame_len()],
        });
        Ok(geometry)
    }

    fn set_light(&mut self, light: Light) -> Result<(), SdkError> {
        let api = self.api.as_ref().ok_or(SdkError::NotInitialized)?;
        let dev = self.device.as_ref().ok_or(SdkError::NotOpened)?;
        let code = match light {
            Light::Green => PARAM_LED_GREEN,
            Light::Red => PARAM_LED_RED,
        };

        api.set_param_u32(dev.handle, code, 1)?;
        std::thread::sleep(LIGHT_PULSE);
        api.set_param_u32(dev.handle, code, 0)
    }

    fn clear_db(&mut self) -> Result<(), SdkError> {
        let api = self.api.as_ref().ok_or(SdkError::NotInitialized)?;
        let dev = self.device.as_ref().ok_or(SdkError::NotOpened)?;
        if dev.db_cache.is_null() {
            return Err(SdkError::Other("DB cache unavailable".into()));
        }
        // SAFETY: `db_cache` is a live cache handle from `db_init`.
        let ret = unsafe { (api.db_clear)(dev.db_cache) };
        check("ZKFPM_DBClear", ret)
    }

    fn acquire_image(&mut self) -> Result<Option<Vec<u8>>, SdkError> {
        let api = self.api.as_ref().ok_or(SdkError::NotInitialized)?;
        let dev = self.device.as_mut().ok_or(SdkError::NotOpened)?;

        // SAFETY: `image` holds exactly width * height bytes and its length is passed along.
        let ret = unsafe {
            (api.acquire_image)(dev.handle, dev.image.as_mut_ptr(), dev.image.len() as c_uint)
        };
        match ret {
            ZKFP_ERR_OK => Ok(Some(dev.image.clone())),
            ZKFP_ERR_CAPTURE => Ok(None),
            code => Err(SdkError::Call {
                call: "ZKFPM_AcquireFingerprintImage",
                code,
                name: error_name(code),
            }),
        }
    }

    fn close_device(&mut self) -> Result<(), SdkError> {
        let Some(dev) = self.device.take() else {
            return Ok(());
        };
        let api = self.api()?;

        if !dev.db_cache.is_null() {
            // SAFETY: `db_cache` is live and freed exactly once here.
            let ret = unsafe { (api.db_free)(dev.db_cache) };
            if let Err(e) = check("ZKFPM_DBFree", ret) {
                tracing::warn!(error = %e, "failed to free DB cache");
            }
        }

        // SAFETY: `handle` is live and closed exactly once here.
        let ret = unsafe { (api.close_device)(dev.handle) };
        check("ZKFPM_CloseDevice", ret)?;
        tracing::debug!("closed fingerprint sensor");
        Ok(())
    }
}

impl Drop for ZkfpSdk {
    fn drop(&mut self) {
        if let Err(e) = self.close_device() {
            tracing::warn!(error = %e, "failed to close sensor on drop");
        }
        if let Some(api) = &self.api {
            // SAFETY: the SDK was initialized through this binding.
            unsafe { (api.terminate)() };
        }
    }
}
