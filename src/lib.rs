//! # KFB Slide
//!
//! An OpenSlide-shaped adapter over the vendor-supplied KFB whole slide image
//! library, which is loaded at runtime and reached only through resolved
//! function pointers.
//!
//! The adapter is meant to be consumed from runtimes (Python via ctypes, for
//! example) that cannot free memory allocated inside a foreign native library.
//! Every buffer that crosses out of the adapter is tracked by its slide and
//! released either on explicit request or when the slide is closed.
//!
//! ## Features
//!
//! - **Checked symbol resolution**: the whole vendor symbol table is resolved
//!   at load time; a library missing any required entry point is rejected
//! - **Synthesized pyramid**: up to six power-of-two levels from the base image
//! - **Associated images**: label, thumbnail and macro, fetched once and served
//!   as independent copies
//! - **Buffer ledger**: explicit free by address with double-free rejection,
//!   and release of everything outstanding at close
//! - **C ABI**: `kfbslide_*` functions, built into the `cdylib`
//!
//! ## Architecture
//!
//! - [`vendor`] - Vendor contract trait and the `dlopen2` binding
//! - [`slide`] - Slide handle, pyramid, properties, associated images, ledger
//! - [`ffi`] - C ABI surface
//! - [`config`] - CLI configuration for `kfb-inspect`
//!
//! ## Example
//!
//! ```rust,no_run
//! use kfb_slide::Slide;
//!
//! fn main() -> Result<(), kfb_slide::SlideError> {
//!     let mut slide = Slide::open("lib/libImageOperationLib.so", "sample.kfb")?;
//!
//!     for name in slide.property_names() {
//!         println!("{}: {:?}", name, slide.property_value(name));
//!     }
//!
//!     let roi = slide.read_region_of_interest(3, 0, 0, 2048, 2048)?;
//!     println!("roi: {} bytes", roi.len());
//!
//!     // Outstanding buffers are released here
//!     slide.close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ffi;
pub mod slide;
pub mod vendor;

// Re-export commonly used types
pub use config::{Config, OutputFormat};
pub use error::{Result, SlideError};
pub use ffi::KfbSlide;
pub use slide::{
    detect_vendor, AssociatedImage, BufferHandle, BufferLedger, PropertyTable, Pyramid, Slide,
    MAX_LEVELS, PROPERTY_NAMES, VENDOR_ID,
};
pub use vendor::{
    AssociatedKind, HeaderInfo, ImageInfo, KfbLibrary, VendorApi, VendorBuffer, VendorImage,
    REQUIRED_SYMBOLS,
};
