//! Slide lifecycle and read tests.
//!
//! Tests verify:
//! - Failed opens release whatever the vendor initialized, and nothing else
//! - Metadata, properties and the synthesized pyramid
//! - Associated images are discovered once and read as independent copies
//! - Region and region-of-interest reads reach the vendor with the right scale

use kfb_slide::{AssociatedKind, Slide, SlideError};

use super::test_utils::{open_slide, standard_vendor, MockVendor, VendorCalls};

// =============================================================================
// Open / Close
// =============================================================================

#[test]
fn test_open_reads_header_once() {
    let (slide, calls) = open_slide(standard_vendor());

    assert_eq!(slide.dimensions(), (4096, 4096));
    assert_eq!(slide.scan_scale(), 40);
    assert_eq!(calls.init_count(), 1);
    assert_eq!(VendorCalls::get(&calls.header), 1);
    assert_eq!(calls.uninit_count(), 0);

    slide.close();
    assert_eq!(calls.uninit_count(), 1);
}

#[test]
fn test_open_failing_init_never_uninitializes() {
    let vendor = MockVendor::new(1024, 1024, 20).with_failing_init();
    let calls = vendor.calls();

    let result = Slide::open_with(vendor, "/data/missing.kfb");
    assert!(matches!(result, Err(SlideError::OpenFailed(_))));
    assert_eq!(calls.init_count(), 1);
    assert_eq!(calls.uninit_count(), 0);
}

#[test]
fn test_open_failing_header_tears_down_context() {
    let vendor = MockVendor::new(1024, 1024, 20).with_failing_header();
    let calls = vendor.calls();

    let result = Slide::open_with(vendor, "/data/corrupt.kfb");
    assert!(matches!(result, Err(SlideError::HeaderReadFailed(_))));
    assert_eq!(calls.uninit_count(), 1);
}

#[test]
fn test_open_rejects_path_with_nul() {
    let vendor = MockVendor::new(1024, 1024, 20);
    let calls = vendor.calls();

    let result = Slide::open_with(vendor, "/data/bad\0name.kfb");
    assert!(matches!(result, Err(SlideError::InvalidPath(_))));
    assert_eq!(calls.init_count(), 0);
}

#[test]
fn test_open_passes_path_bytes_unchanged() {
    let (slide, calls) = open_slide(standard_vendor());
    assert_eq!(calls.last_path().unwrap(), b"/data/slides/200615671.kfb");
    slide.close();
}

#[cfg(unix)]
#[test]
fn test_open_non_utf8_path() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    // GBK-encoded file name
    let raw: &[u8] = b"/data/\xd1\xf9\xb1\xbe.kfb";
    let vendor = standard_vendor();
    let calls = vendor.calls();

    let slide = Slide::open_with(vendor, OsStr::from_bytes(raw)).unwrap();
    assert_eq!(calls.last_path().unwrap(), raw);
    assert_eq!(slide.dimensions(), (4096, 4096));
}

#[test]
fn test_open_missing_library() {
    let result = Slide::open("/nonexistent/libImageOperationLib.so", "/data/sample.kfb");
    match result {
        Err(SlideError::LibraryLoad { path, .. }) => {
            assert!(path.contains("/nonexistent/libImageOperationLib.so"));
        }
        other => panic!("expected LibraryLoad, got {:?}", other.err()),
    }
}

// =============================================================================
// Metadata
// =============================================================================

#[test]
fn test_properties() {
    let (slide, _calls) = open_slide(standard_vendor());

    assert_eq!(
        slide.property_names(),
        &[
            "openslide.mpp-x",
            "openslide.mpp-t",
            "openslide.vendor",
            "scanScale"
        ]
    );
    assert_eq!(slide.property_value("openslide.mpp-x"), Some("0.242800"));
    assert_eq!(slide.property_value("openslide.mpp-t"), Some("0.242800"));
    assert_eq!(slide.property_value("openslide.vendor"), Some("Kfbio"));
    assert_eq!(slide.property_value("scanScale"), Some("40"));
    assert_eq!(slide.property_value("openslide.objective-power"), None);
}

#[test]
fn test_pyramid_levels() {
    let (slide, _calls) = open_slide(standard_vendor());

    assert_eq!(slide.level_count(), 6);
    assert_eq!(slide.level_downsample(0), Some(1.0));
    assert_eq!(slide.level_downsample(5), Some(32.0));
    assert_eq!(slide.level_downsample(6), None);
    assert_eq!(slide.level_dimensions(0), Some((4096, 4096)));
    assert_eq!(slide.level_dimensions(3), Some((512, 512)));
    assert_eq!(slide.level_dimensions(6), None);
}

#[test]
fn test_best_level_for_downsample() {
    let (slide, _calls) = open_slide(MockVendor::new(10000, 8000, 20));

    assert_eq!(slide.level_count(), 6);
    assert_eq!(slide.best_level_for_downsample(0.5), Some(0));
    assert_eq!(slide.best_level_for_downsample(1.5), Some(0));
    assert_eq!(slide.best_level_for_downsample(4.7), Some(2));
    assert_eq!(slide.best_level_for_downsample(79.0), Some(5));
}

#[test]
fn test_small_slide_caps_levels_by_size() {
    // floor(log2(40)) = 5
    let (slide, _calls) = open_slide(MockVendor::new(40, 30, 20));

    assert_eq!(slide.level_count(), 5);
    assert_eq!(slide.level_dimensions(4), Some((2, 1)));
    assert_eq!(slide.best_level_for_downsample(79.0), Some(4));
}

#[test]
fn test_tiny_slide_has_no_levels() {
    let (mut slide, _calls) = open_slide(MockVendor::new(1, 1, 20));

    assert_eq!(slide.level_count(), 0);
    assert_eq!(slide.level_downsample(0), None);
    assert!(matches!(
        slide.read_region(0, 0, 0),
        Err(SlideError::LevelOutOfRange { level: 0, count: 0 })
    ));
}

// =============================================================================
// Associated Images
// =============================================================================

#[test]
fn test_associated_names_discovered_once() {
    let (mut slide, calls) = open_slide(standard_vendor());

    let first = slide.associated_image_names();
    let second = slide.associated_image_names();

    assert_eq!(first, vec!["label", "thumbnail"]);
    assert_eq!(first, second);
    assert_eq!(calls.associated_count(), AssociatedKind::ALL.len());
}

#[test]
fn test_associated_vendor_buffers_released_after_copy() {
    let (mut slide, calls) = open_slide(standard_vendor());

    slide.associated_image_names();
    assert_eq!(calls.live_count(), 0);
    assert_eq!(calls.released_count(), 2);
    assert_eq!(slide.outstanding_buffers(), 0);
}

#[test]
fn test_associated_dimensions() {
    let (mut slide, calls) = open_slide(standard_vendor());

    // Dimensions populate the cache without a prior names query
    assert_eq!(slide.associated_image_dimensions("label"), Some((120, 60, 32)));
    assert_eq!(
        slide.associated_image_dimensions("thumbnail"),
        Some((256, 128, 48))
    );
    assert_eq!(slide.associated_image_dimensions("macro"), None);
    assert_eq!(slide.associated_image_dimensions("overview"), None);
    assert_eq!(calls.associated_count(), 3);
}

#[test]
fn test_read_associated_returns_independent_copies() {
    let (mut slide, _calls) = open_slide(standard_vendor());

    let first = slide.read_associated_image("thumbnail").unwrap();
    let second = slide.read_associated_image("thumbnail").unwrap();
    assert_ne!(first.as_ptr(), second.as_ptr());
    assert_eq!(first.len(), 48);

    slide.buffer_mut(first.as_ptr()).unwrap().fill(0);

    assert_eq!(slide.buffer(second.as_ptr()).unwrap(), &[0x22; 48][..]);
    let third = slide.read_associated_image("thumbnail").unwrap();
    assert_eq!(slide.buffer(third.as_ptr()).unwrap(), &[0x22; 48][..]);
    assert_eq!(slide.outstanding_buffers(), 3);
}

#[test]
fn test_read_missing_associated_image() {
    let (mut slide, _calls) = open_slide(standard_vendor());

    assert!(slide.read_associated_image("macro").is_none());
    assert!(slide.read_associated_image("").is_none());
    assert_eq!(slide.outstanding_buffers(), 0);
}

#[test]
fn test_slide_without_associated_images() {
    let (mut slide, calls) = open_slide(MockVendor::new(2048, 2048, 20));

    assert!(slide.associated_image_names().is_empty());
    assert!(slide.associated_image_names().is_empty());
    assert_eq!(calls.associated_count(), 3);
}

// =============================================================================
// Region Reads
// =============================================================================

#[test]
fn test_read_region_scale() {
    let (mut slide, calls) = open_slide(standard_vendor());

    let handle = slide.read_region(2, 512, 256).unwrap();
    assert_eq!(handle.len(), 6);
    assert_eq!(calls.last_stream(), Some((10.0, 512, 256)));
    assert_eq!(
        slide.buffer(handle.as_ptr()).unwrap(),
        &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10][..]
    );
}

#[test]
fn test_read_region_level_out_of_range() {
    let (mut slide, calls) = open_slide(standard_vendor());

    let result = slide.read_region(6, 0, 0);
    assert!(matches!(
        result,
        Err(SlideError::LevelOutOfRange { level: 6, count: 6 })
    ));
    assert_eq!(VendorCalls::get(&calls.stream), 0);
}

#[test]
fn test_read_region_empty_tile() {
    let (mut slide, _calls) = open_slide(standard_vendor().with_tile(Vec::new()));

    let result = slide.read_region(0, 0, 0);
    assert!(matches!(
        result,
        Err(SlideError::RegionReadFailed { bytes: 0, .. })
    ));
    assert_eq!(slide.outstanding_buffers(), 0);
}

#[test]
fn test_read_roi_level_three() {
    let (mut slide, calls) = open_slide(standard_vendor());

    let handle = slide.read_region_of_interest(3, 0, 0, 2048, 2048).unwrap();
    assert_eq!(handle.len(), 100);
    assert_eq!(slide.outstanding_buffers(), 1);
    assert_eq!(calls.last_roi(), Some((5.0, 0, 0, 2048, 2048)));
}

#[test]
fn test_read_roi_rescales_origin() {
    let (mut slide, calls) = open_slide(standard_vendor());

    slide.read_region_of_interest(2, 1000, 2003, 300, 200).unwrap();
    assert_eq!(calls.last_roi(), Some((10.0, 250, 500, 300, 200)));
}

#[test]
fn test_read_roi_failure_still_tracked() {
    let (mut slide, calls) = open_slide(standard_vendor().with_roi(vec![0x01; 16], false));

    let result = slide.read_region_of_interest(0, 0, 0, 64, 64);
    assert!(matches!(result, Err(SlideError::RoiReadFailed { .. })));
    assert_eq!(slide.outstanding_buffers(), 1);

    slide.close();
    assert_eq!(calls.live_count(), 0);
    assert_eq!(calls.released_count(), 1);
}
