//! C ABI for foreign callers.
//!
//! The functions here mirror the OpenSlide-shaped `kfbslide_*` interface.
//! Callers in runtimes that cannot free native memory never release anything
//! themselves: every buffer returned here is owned by the handle and is either
//! returned through [`kfbslide_buffer_free`] or released by
//! [`kfbslide_close`].
//!
//! Out-of-range queries return sentinels (`0`, `0.0`, `-1`, null or `false`)
//! instead of failing. All functions tolerate a null handle.
//!
//! # Safety
//!
//! A handle must not be used concurrently, and must not be used at all after
//! it has been passed to [`kfbslide_close`]. Strings and name arrays returned
//! by a handle stay valid until that handle is closed.

use std::ffi::{c_char, c_int, CStr};
use std::path::Path;
use std::ptr;

use tracing::{error, warn};

use crate::error::SlideError;
use crate::slide::{Slide, PROPERTY_C_NAMES};
use crate::vendor::AssociatedKind;

/// Handle returned to C callers.
pub struct KfbSlide {
    slide: Slide,
    /// Null-terminated associated image names, built on first request
    associated_names: Option<Vec<*const c_char>>,
}

impl KfbSlide {
    pub fn new(slide: Slide) -> Self {
        Self {
            slide,
            associated_names: None,
        }
    }

    pub fn slide(&self) -> &Slide {
        &self.slide
    }

    /// Move into a heap handle owned by the C side.
    pub fn into_raw(self) -> *mut KfbSlide {
        Box::into_raw(Box::new(self))
    }
}

/// Null-terminated table of static C strings.
#[repr(transparent)]
struct NameTable<const N: usize>([*const c_char; N]);

// Every entry points into static, immutable data.
unsafe impl<const N: usize> Sync for NameTable<N> {}

static PROPERTY_NAME_TABLE: NameTable<5> = NameTable([
    PROPERTY_C_NAMES[0].as_ptr(),
    PROPERTY_C_NAMES[1].as_ptr(),
    PROPERTY_C_NAMES[2].as_ptr(),
    PROPERTY_C_NAMES[3].as_ptr(),
    ptr::null(),
]);

unsafe fn c_str<'a>(s: *const c_char) -> Option<&'a CStr> {
    if s.is_null() {
        None
    } else {
        Some(CStr::from_ptr(s))
    }
}

/// A path argument as the raw bytes the caller passed. Vendor file names are
/// not necessarily UTF-8.
#[cfg(unix)]
unsafe fn c_path<'a>(s: *const c_char) -> Option<&'a Path> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    c_str(s).map(|value| Path::new(OsStr::from_bytes(value.to_bytes())))
}

#[cfg(not(unix))]
unsafe fn c_path<'a>(s: *const c_char) -> Option<&'a Path> {
    let value = c_str(s)?;
    match value.to_str() {
        Ok(v) => Some(Path::new(v)),
        Err(_) => {
            warn!("Path is not valid UTF-8: {:?}", value);
            None
        }
    }
}

fn level_index(level: c_int) -> Option<usize> {
    usize::try_from(level).ok()
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Load the vendor library at `dll_path` and open `filename`.
///
/// Returns null if the slide cannot be opened. A vendor library missing a
/// required symbol is reported at error level and also yields null.
///
/// # Safety
///
/// Both arguments must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_open(
    dll_path: *const c_char,
    filename: *const c_char,
) -> *mut KfbSlide {
    let (Some(dll_path), Some(filename)) = (c_path(dll_path), c_path(filename)) else {
        return ptr::null_mut();
    };

    match Slide::open(dll_path, filename) {
        Ok(slide) => KfbSlide::new(slide).into_raw(),
        Err(e @ (SlideError::MissingSymbol { .. } | SlideError::LibraryLoad { .. })) => {
            error!("Cannot use vendor library {}: {}", dll_path.display(), e);
            ptr::null_mut()
        }
        Err(e) => {
            warn!("Failed to open {}: {}", filename.display(), e);
            ptr::null_mut()
        }
    }
}

/// Close a handle and release everything it owns.
///
/// # Safety
///
/// `s` must be null or a live handle; it is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_close(s: *mut KfbSlide) {
    if !s.is_null() {
        drop(Box::from_raw(s));
    }
}

/// Vendor detection. Always `"kfbio"`.
#[no_mangle]
pub extern "C" fn kfbslide_detect_vendor(_filename: *const c_char) -> *const c_char {
    c"kfbio".as_ptr()
}

// =============================================================================
// Properties
// =============================================================================

/// Null-terminated array of property names.
#[no_mangle]
pub extern "C" fn kfbslide_property_names(_s: *const KfbSlide) -> *const *const c_char {
    PROPERTY_NAME_TABLE.0.as_ptr()
}

/// Value of a property, or null if the name is unknown.
///
/// # Safety
///
/// `s` must be null or a live handle; `name` null or a valid C string.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_property_value(
    s: *const KfbSlide,
    name: *const c_char,
) -> *const c_char {
    let (Some(s), Some(name)) = (s.as_ref(), c_str(name)) else {
        return ptr::null();
    };
    s.slide
        .properties()
        .c_value(name)
        .map_or(ptr::null(), CStr::as_ptr)
}

// =============================================================================
// Levels
// =============================================================================

/// Downsample of `level`, or `0.0` if out of range.
///
/// # Safety
///
/// `s` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_get_level_downsample(s: *const KfbSlide, level: c_int) -> f64 {
    s.as_ref()
        .zip(level_index(level))
        .and_then(|(s, level)| s.slide.level_downsample(level))
        .unwrap_or(0.0)
}

/// Best level for `downsample`, or `-1` if the slide has no levels.
///
/// # Safety
///
/// `s` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_get_best_level_for_downsample(
    s: *const KfbSlide,
    downsample: f64,
) -> c_int {
    s.as_ref()
        .and_then(|s| s.slide.best_level_for_downsample(downsample))
        .map_or(-1, |level| level as c_int)
}

/// Number of levels.
///
/// # Safety
///
/// `s` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_get_level_count(s: *const KfbSlide) -> c_int {
    s.as_ref().map_or(0, |s| s.slide.level_count() as c_int)
}

/// Write the dimensions of `level` and return its height, or return `0`
/// without writing if the level is out of range or an out-param is null.
///
/// # Safety
///
/// `s` must be null or a live handle; `width` and `height` null or writable.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_get_level_dimensions(
    s: *const KfbSlide,
    level: c_int,
    width: *mut i64,
    height: *mut i64,
) -> i64 {
    let Some((s, level)) = s.as_ref().zip(level_index(level)) else {
        return 0;
    };
    if width.is_null() || height.is_null() {
        warn!("kfbslide_get_level_dimensions needs non-null width and height");
        return 0;
    }
    match s.slide.level_dimensions(level) {
        Some((w, h)) => {
            *width = i64::from(w);
            *height = i64::from(h);
            i64::from(h)
        }
        None => 0,
    }
}

// =============================================================================
// Associated Images
// =============================================================================

/// Null-terminated array of available associated image names.
///
/// The vendor is queried on the first call only.
///
/// # Safety
///
/// `s` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_get_associated_image_names(
    s: *mut KfbSlide,
) -> *const *const c_char {
    let Some(s) = s.as_mut() else {
        return ptr::null();
    };
    let KfbSlide {
        slide,
        associated_names,
    } = s;
    associated_names
        .get_or_insert_with(|| {
            slide
                .associated_images()
                .iter()
                .map(|img| img.kind.c_name().as_ptr())
                .chain(std::iter::once(ptr::null()))
                .collect()
        })
        .as_ptr()
}

/// Write `(width, height, byte_len)` of an associated image, all zero if the
/// name is unknown.
///
/// # Safety
///
/// `s` must be null or a live handle; `name` null or a valid C string; the
/// out-params null or writable.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_get_associated_image_dimensions(
    s: *mut KfbSlide,
    name: *const c_char,
    width: *mut i64,
    height: *mut i64,
    n_bytes: *mut i64,
) {
    if width.is_null() || height.is_null() || n_bytes.is_null() {
        warn!("kfbslide_get_associated_image_dimensions needs non-null width, height and n_bytes");
        return;
    }

    let dims = s
        .as_mut()
        .zip(associated_name(name))
        .and_then(|(s, name)| s.slide.associated_image_dimensions(name));
    let (w, h, n) = dims.map_or((0, 0, 0), |(w, h, n)| {
        (i64::from(w), i64::from(h), n as i64)
    });
    *width = w;
    *height = h;
    *n_bytes = n;
}

/// A fresh copy of an associated image, or null if the name is unknown.
///
/// The copy is owned by the handle; free it with [`kfbslide_buffer_free`] or
/// leave it to [`kfbslide_close`].
///
/// # Safety
///
/// `s` must be null or a live handle; `name` null or a valid C string.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_read_associated_image(
    s: *mut KfbSlide,
    name: *const c_char,
) -> *mut u8 {
    s.as_mut()
        .zip(associated_name(name))
        .and_then(|(s, name)| s.slide.read_associated_image(name))
        .map_or(ptr::null_mut(), |handle| handle.as_ptr())
}

unsafe fn associated_name<'a>(name: *const c_char) -> Option<&'a str> {
    let name = c_str(name)?.to_str().ok()?;
    AssociatedKind::from_name(name).map(AssociatedKind::name)
}

// =============================================================================
// Region Reads
// =============================================================================

/// Read the vendor tile at `level` with top-left corner `(x, y)`.
///
/// On success writes the buffer and its byte count and returns `true`. On
/// failure writes null and `0`; any buffer the vendor produced is still
/// released at close.
///
/// # Safety
///
/// `s` must be null or a live handle; the out-params null or writable.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_read_region(
    s: *mut KfbSlide,
    level: c_int,
    x: c_int,
    y: c_int,
    n_bytes: *mut c_int,
    buf: *mut *mut u8,
) -> bool {
    let Some((s, level)) = s.as_mut().zip(level_index(level)) else {
        return false;
    };
    if buf.is_null() || n_bytes.is_null() {
        warn!("kfbslide_read_region needs non-null n_bytes and buf");
        return false;
    }
    write_read_result(s.slide.read_region(level, x, y), n_bytes, buf)
}

/// Read a `width` x `height` region at `level`; `x` and `y` are level-0
/// coordinates.
///
/// Output follows [`kfbslide_read_region`]. When the vendor reports failure
/// but still allocated a buffer, that buffer is tracked by the handle and
/// released by [`kfbslide_close`]. The caller receives null and `0` and
/// cannot free it earlier.
///
/// # Safety
///
/// `s` must be null or a live handle; the out-params null or writable.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_get_image_roi_stream(
    s: *mut KfbSlide,
    level: c_int,
    x: c_int,
    y: c_int,
    width: c_int,
    height: c_int,
    n_bytes: *mut c_int,
    buf: *mut *mut u8,
) -> bool {
    let Some((s, level)) = s.as_mut().zip(level_index(level)) else {
        return false;
    };
    if buf.is_null() || n_bytes.is_null() {
        warn!("kfbslide_get_image_roi_stream needs non-null n_bytes and buf");
        return false;
    }
    write_read_result(
        s.slide.read_region_of_interest(level, x, y, width, height),
        n_bytes,
        buf,
    )
}

unsafe fn write_read_result(
    result: crate::error::Result<crate::slide::BufferHandle>,
    n_bytes: *mut c_int,
    buf: *mut *mut u8,
) -> bool {
    match result {
        Ok(handle) => {
            *buf = handle.as_ptr();
            *n_bytes = c_int::try_from(handle.len()).unwrap_or(c_int::MAX);
            true
        }
        Err(_) => {
            *buf = ptr::null_mut();
            *n_bytes = 0;
            false
        }
    }
}

// =============================================================================
// Buffer Release
// =============================================================================

/// Release a buffer previously returned by this handle.
///
/// Returns `false`, doing nothing, for null, already freed, or foreign
/// pointers.
///
/// # Safety
///
/// `s` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn kfbslide_buffer_free(s: *mut KfbSlide, buf: *mut u8) -> bool {
    match s.as_mut() {
        Some(s) => s.slide.free_buffer(buf),
        None => false,
    }
}
