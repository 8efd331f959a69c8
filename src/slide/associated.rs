//! Associated image cache.
//!
//! Label, thumbnail and macro images are fetched from the vendor at most once
//! per slide, copied into adapter-owned storage, and served from the snapshot
//! afterwards. Images the vendor does not provide are simply absent.

use bytes::Bytes;
use tracing::debug;

use crate::vendor::{AssociatedKind, ImageInfo, VendorApi};

/// A cached associated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociatedImage {
    pub kind: AssociatedKind,
    pub width: u32,
    pub height: u32,
    /// Encoded image bytes (JPEG as produced by the vendor)
    pub data: Bytes,
}

impl AssociatedImage {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Default)]
enum CacheState {
    #[default]
    Unpopulated,
    Populated(Vec<AssociatedImage>),
}

/// Populate-once snapshot of the vendor's associated images.
#[derive(Debug, Default)]
pub struct AssociatedImages {
    state: CacheState,
}

impl AssociatedImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_populated(&self) -> bool {
        matches!(self.state, CacheState::Populated(_))
    }

    /// Return the cached images, querying the vendor on first use.
    ///
    /// Each vendor image is copied and its vendor buffer released right away.
    pub fn get_or_populate(
        &mut self,
        vendor: &dyn VendorApi,
        ctx: &mut ImageInfo,
    ) -> &[AssociatedImage] {
        if let CacheState::Unpopulated = self.state {
            let images = discover(vendor, ctx);
            debug!(
                "Associated images discovered: {:?}",
                images.iter().map(AssociatedImage::name).collect::<Vec<_>>()
            );
            self.state = CacheState::Populated(images);
        }

        match &self.state {
            CacheState::Populated(images) => images,
            CacheState::Unpopulated => &[],
        }
    }

    /// Cached image by name. Never queries the vendor.
    pub fn get(&self, name: &str) -> Option<&AssociatedImage> {
        match &self.state {
            CacheState::Populated(images) => images.iter().find(|img| img.name() == name),
            CacheState::Unpopulated => None,
        }
    }
}

fn discover(vendor: &dyn VendorApi, ctx: &mut ImageInfo) -> Vec<AssociatedImage> {
    let mut images = Vec::with_capacity(AssociatedKind::ALL.len());

    for kind in AssociatedKind::ALL {
        let Some(raw) = vendor.associated_image(ctx, kind) else {
            debug!("Vendor has no {} image", kind.name());
            continue;
        };

        let data = Bytes::copy_from_slice(unsafe { raw.buffer.as_slice() });
        unsafe { vendor.release_buffer(raw.buffer) };

        images.push(AssociatedImage {
            kind,
            width: u32::try_from(raw.width).unwrap_or(0),
            height: u32::try_from(raw.height).unwrap_or(0),
            data,
        });
    }

    images
}
