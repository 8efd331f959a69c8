//! The slide handle.
//!
//! [`Slide`] is the single owner of everything tied to one opened file: the
//! vendor library, the vendor context, the synthesized pyramid, the property
//! table, the associated image cache and the buffer ledger.
//!
//! # Threading
//!
//! A slide is not synchronized internally and is neither `Send` nor `Sync`.
//! Independent slides may be used side by side only if the vendor library
//! supports concurrent contexts.

use std::ffi::CString;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Result, SlideError};
use crate::vendor::{HeaderInfo, ImageInfo, KfbLibrary, VendorApi};

use super::associated::{AssociatedImage, AssociatedImages};
use super::ledger::{BufferHandle, BufferLedger};
use super::properties::PropertyTable;
use super::pyramid::Pyramid;

/// Value returned by [`detect_vendor`].
pub const VENDOR_ID: &str = "kfbio";

/// Vendor detection. Every file handled by this adapter is a KFB slide.
pub fn detect_vendor(_path: impl AsRef<Path>) -> &'static str {
    VENDOR_ID
}

// =============================================================================
// VendorSession
// =============================================================================

/// Vendor library plus the context it initialized.
///
/// Teardown runs exactly once, on [`teardown`](Self::teardown) or on drop,
/// and only if init succeeded. The library is unloaded after teardown.
struct VendorSession {
    vendor: Box<dyn VendorApi>,
    ctx: Box<ImageInfo>,
    initialized: bool,
}

impl VendorSession {
    fn init(vendor: Box<dyn VendorApi>, path: &CString) -> Option<Self> {
        let mut session = Self {
            vendor,
            ctx: Box::new(ImageInfo::new()),
            initialized: false,
        };
        session.initialized = session.vendor.init_image_file(&mut *session.ctx, path);
        session.initialized.then_some(session)
    }

    fn call<T>(&mut self, f: impl FnOnce(&dyn VendorApi, &mut ImageInfo) -> T) -> T {
        f(self.vendor.as_ref(), &mut *self.ctx)
    }

    fn teardown(&mut self) {
        if std::mem::take(&mut self.initialized) && !self.vendor.uninit_image_file(&mut *self.ctx) {
            warn!("Vendor reported failure tearing down slide context");
        }
    }
}

impl Drop for VendorSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

// =============================================================================
// Slide
// =============================================================================

/// An opened KFB slide.
///
/// Buffers returned by the read operations are owned by the slide and stay
/// valid until passed to [`free_buffer`](Self::free_buffer) or until the slide
/// is closed, which releases all of them.
pub struct Slide {
    ledger: BufferLedger,
    associated: AssociatedImages,
    properties: PropertyTable,
    pyramid: Pyramid,
    header: HeaderInfo,
    session: VendorSession,
}

impl Slide {
    /// Load the vendor library at `library_path` and open `file_path` with it.
    pub fn open(library_path: impl AsRef<Path>, file_path: impl AsRef<Path>) -> Result<Self> {
        let library = KfbLibrary::load(library_path)?;
        Self::open_with(library, file_path)
    }

    /// Open `file_path` through an already resolved vendor.
    ///
    /// On failure everything acquired so far is released before returning:
    /// a context that was initialized is torn down and the vendor is dropped.
    pub fn open_with<V: VendorApi + 'static>(
        vendor: V,
        file_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let file_path = file_path.as_ref();
        let path_str = file_path.display().to_string();
        let c_path = CString::new(file_path.as_os_str().as_encoded_bytes())
            .map_err(|_| SlideError::InvalidPath(path_str.clone()))?;

        let mut session = VendorSession::init(Box::new(vendor), &c_path).ok_or_else(|| {
            warn!("Vendor failed to initialize slide: {}", path_str);
            SlideError::OpenFailed(path_str.clone())
        })?;

        let header = session
            .call(|vendor, ctx| vendor.header_info(ctx))
            .ok_or_else(|| {
                warn!("Vendor failed to read header: {}", path_str);
                SlideError::HeaderReadFailed(path_str.clone())
            })?;

        let (Ok(width), Ok(height)) = (u32::try_from(header.width), u32::try_from(header.height))
        else {
            warn!(
                "Vendor reported negative dimensions {}x{} for {}",
                header.width, header.height, path_str
            );
            return Err(SlideError::HeaderReadFailed(path_str));
        };

        let pyramid = Pyramid::new(width, height);
        info!(
            "Opened slide {}: {}x{} at {}x, {} levels",
            path_str,
            width,
            height,
            header.scan_scale,
            pyramid.level_count()
        );

        Ok(Self {
            ledger: BufferLedger::new(),
            associated: AssociatedImages::new(),
            properties: PropertyTable::from_header(&header),
            pyramid,
            header,
            session,
        })
    }

    /// Close the slide, releasing the vendor context, every outstanding
    /// buffer, and the vendor library.
    pub fn close(self) {
        drop(self);
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Full-resolution `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.pyramid.width(), self.pyramid.height())
    }

    /// Base magnification from the header.
    pub fn scan_scale(&self) -> i32 {
        self.header.scan_scale
    }

    /// The complete header record read at open time.
    pub fn header(&self) -> &HeaderInfo {
        &self.header
    }

    pub fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }

    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    pub fn property_names(&self) -> &'static [&'static str] {
        self.properties.names()
    }

    pub fn property_value(&self, name: &str) -> Option<&str> {
        self.properties.value(name)
    }

    pub fn level_count(&self) -> usize {
        self.pyramid.level_count()
    }

    pub fn level_downsample(&self, level: usize) -> Option<f64> {
        self.pyramid.level_downsample(level)
    }

    pub fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.pyramid.level_dimensions(level)
    }

    pub fn best_level_for_downsample(&self, downsample: f64) -> Option<usize> {
        self.pyramid.best_level_for_downsample(downsample)
    }

    // =========================================================================
    // Associated Images
    // =========================================================================

    /// The cached associated images, discovering them on first use.
    pub fn associated_images(&mut self) -> &[AssociatedImage] {
        let Self {
            associated,
            session,
            ..
        } = self;
        session.call(move |vendor, ctx| associated.get_or_populate(vendor, ctx))
    }

    /// Names of the available associated images, in discovery order.
    pub fn associated_image_names(&mut self) -> Vec<&'static str> {
        self.associated_images()
            .iter()
            .map(AssociatedImage::name)
            .collect()
    }

    /// `(width, height, byte_len)` of an associated image, or `None` if the
    /// slide has no image by that name.
    pub fn associated_image_dimensions(&mut self, name: &str) -> Option<(u32, u32, usize)> {
        self.associated_images();
        self.associated
            .get(name)
            .map(|img| (img.width, img.height, img.byte_len()))
    }

    /// A fresh copy of an associated image, tracked in the ledger.
    ///
    /// Every call allocates a new buffer; changing or freeing one copy never
    /// affects the cache or other copies.
    pub fn read_associated_image(&mut self, name: &str) -> Option<BufferHandle> {
        self.associated_images();
        let image = self.associated.get(name)?;
        Some(self.ledger.track_copy(&image.data))
    }

    // =========================================================================
    // Region Reads
    // =========================================================================

    fn check_level(&self, level: usize) -> Result<f64> {
        self.level_downsample(level)
            .ok_or(SlideError::LevelOutOfRange {
                level,
                count: self.level_count(),
            })
    }

    /// Read the vendor tile at `level` whose top-left corner is `(x, y)`.
    ///
    /// The vendor picks the tile size. A non-null buffer is tracked even when
    /// the read reports no bytes.
    pub fn read_region(&mut self, level: usize, x: i32, y: i32) -> Result<BufferHandle> {
        let downsample = self.check_level(level)?;
        let scale = (self.header.scan_scale as f64 / downsample) as f32;

        let buffer = self
            .session
            .call(|vendor, ctx| vendor.image_stream(ctx, scale, x, y));
        let handle = self.ledger.track_vendor(buffer);

        match handle {
            Some(handle) if buffer.len > 0 => Ok(handle),
            _ => {
                warn!(
                    "Region read at level {} ({}, {}) returned {} bytes",
                    level, x, y, buffer.len
                );
                Err(SlideError::RegionReadFailed {
                    level,
                    x,
                    y,
                    bytes: buffer.len,
                })
            }
        }
    }

    /// Read a `width` x `height` region at `level`.
    ///
    /// `x` and `y` are level-0 coordinates and are divided by the level's
    /// downsample before reaching the vendor. Any buffer the vendor allocates
    /// is tracked, including on a reported failure.
    pub fn read_region_of_interest(
        &mut self,
        level: usize,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<BufferHandle> {
        let downsample = self.check_level(level)?;
        let scale = (self.header.scan_scale as f64 / downsample) as f32;
        let factor = 1i32 << level;
        let (level_x, level_y) = (x / factor, y / factor);

        let (buffer, ok) = self.session.call(|vendor, ctx| {
            vendor.image_roi(ctx, scale, level_x, level_y, width, height)
        });
        let handle = self.ledger.track_vendor(buffer);

        match handle {
            Some(handle) if ok => Ok(handle),
            _ => {
                warn!(
                    "Region of interest read failed at level {} ({}, {}, {}x{})",
                    level, x, y, width, height
                );
                Err(SlideError::RoiReadFailed {
                    level,
                    x,
                    y,
                    width,
                    height,
                })
            }
        }
    }

    // =========================================================================
    // Buffer Ledger
    // =========================================================================

    /// Bytes of an outstanding buffer.
    pub fn buffer(&self, ptr: *const u8) -> Option<&[u8]> {
        self.ledger.get(ptr)
    }

    /// Mutable bytes of an outstanding buffer.
    pub fn buffer_mut(&mut self, ptr: *const u8) -> Option<&mut [u8]> {
        self.ledger.get_mut(ptr)
    }

    /// Release an outstanding buffer by address.
    ///
    /// Returns `false` if the address is not outstanding (never issued,
    /// already freed, or null).
    pub fn free_buffer(&mut self, ptr: *const u8) -> bool {
        self.ledger.free(ptr, self.session.vendor.as_ref())
    }

    pub fn outstanding_buffers(&self) -> usize {
        self.ledger.len()
    }
}

impl Drop for Slide {
    fn drop(&mut self) {
        self.session.teardown();
        let released = self.ledger.release_all(self.session.vendor.as_ref());
        debug!("Slide closed, released {} outstanding buffers", released);
    }
}
