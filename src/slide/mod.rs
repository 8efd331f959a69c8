//! Slide handle and the state it owns.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        C ABI (kfbslide_*) / Rust        │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                 Slide                   │
//! │  Pyramid · PropertyTable · Associated   │
//! │  Images · BufferLedger                  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        VendorApi (KfbLibrary)           │
//! │  dynamically loaded vendor decoder      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use kfb_slide::Slide;
//!
//! let mut slide = Slide::open("lib/libImageOperationLib.so", "sample.kfb")?;
//! let level = slide.best_level_for_downsample(8.0).unwrap_or(0);
//! let tile = slide.read_region(level, 0, 0)?;
//! println!("tile is {} bytes", slide.buffer(tile.as_ptr()).map_or(0, <[u8]>::len));
//! slide.free_buffer(tile.as_ptr());
//! slide.close();
//! # Ok::<(), kfb_slide::SlideError>(())
//! ```

mod associated;
mod handle;
mod ledger;
mod properties;
mod pyramid;

pub use associated::{AssociatedImage, AssociatedImages};
pub use handle::{detect_vendor, Slide, VENDOR_ID};
pub use ledger::{BufferHandle, BufferLedger};
pub use properties::{
    PropertyTable, PROPERTY_C_NAMES, PROPERTY_MPP_T, PROPERTY_MPP_X, PROPERTY_NAMES,
    PROPERTY_SCAN_SCALE, PROPERTY_VENDOR, VENDOR_NAME,
};
pub use pyramid::{Pyramid, MAX_LEVELS};
