//! Buffer ledger.
//!
//! Every buffer handed to a caller stays owned by the slide until the caller
//! frees it by address or the slide is closed. Callers living in another
//! memory-management regime never release these buffers themselves.
//!
//! Two kinds of storage are tracked:
//!
//! - **Copies** made by the adapter (associated images), released by dropping
//!   the allocation.
//! - **Vendor buffers** handed through unchanged (region reads), released
//!   through [`VendorApi::release_buffer`].

use std::slice;

use tracing::warn;

use crate::vendor::{VendorApi, VendorBuffer};

/// An outstanding buffer as seen by the caller.
///
/// The address identifies the buffer to [`BufferLedger::free`]. It stays
/// valid until freed or until the owning slide is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle {
    ptr: *mut u8,
    len: usize,
}

impl BufferHandle {
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

enum Storage {
    Copy(Box<[u8]>),
    Vendor(VendorBuffer),
}

struct Entry {
    handle: BufferHandle,
    storage: Storage,
}

impl Entry {
    fn release(self, vendor: &dyn VendorApi) {
        match self.storage {
            Storage::Copy(bytes) => drop(bytes),
            Storage::Vendor(buffer) => unsafe { vendor.release_buffer(buffer) },
        }
    }
}

/// Set of buffers currently owned on behalf of the caller.
#[derive(Default)]
pub struct BufferLedger {
    entries: Vec<Entry>,
}

impl BufferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding buffers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, ptr: *const u8) -> bool {
        self.position(ptr).is_some()
    }

    fn position(&self, ptr: *const u8) -> Option<usize> {
        if ptr.is_null() {
            return None;
        }
        self.entries
            .iter()
            .position(|e| e.handle.ptr.cast_const() == ptr)
    }

    /// Track a fresh adapter-owned copy of `bytes`.
    ///
    /// Empty inputs still get a distinct one-byte allocation so every issued
    /// address is unique.
    pub fn track_copy(&mut self, bytes: &[u8]) -> BufferHandle {
        let mut storage = vec![0u8; bytes.len().max(1)].into_boxed_slice();
        storage[..bytes.len()].copy_from_slice(bytes);

        let handle = BufferHandle {
            ptr: storage.as_mut_ptr(),
            len: bytes.len(),
        };
        self.entries.push(Entry {
            handle,
            storage: Storage::Copy(storage),
        });
        handle
    }

    /// Track a vendor-allocated buffer. Null buffers own nothing and are not
    /// tracked.
    pub fn track_vendor(&mut self, buffer: VendorBuffer) -> Option<BufferHandle> {
        if buffer.is_null() {
            return None;
        }

        if let Some(index) = self.position(buffer.ptr) {
            warn!(
                "Vendor returned address {:p} that is already outstanding; keeping a single entry",
                buffer.ptr
            );
            return Some(self.entries[index].handle);
        }

        let handle = BufferHandle {
            ptr: buffer.ptr,
            len: usize::try_from(buffer.len).unwrap_or(0),
        };
        self.entries.push(Entry {
            handle,
            storage: Storage::Vendor(buffer),
        });
        Some(handle)
    }

    /// Bytes of an outstanding buffer.
    pub fn get(&self, ptr: *const u8) -> Option<&[u8]> {
        let entry = &self.entries[self.position(ptr)?];
        Some(match &entry.storage {
            Storage::Copy(bytes) => &bytes[..entry.handle.len],
            Storage::Vendor(_) => unsafe {
                slice::from_raw_parts(entry.handle.ptr, entry.handle.len)
            },
        })
    }

    /// Mutable bytes of an outstanding buffer.
    pub fn get_mut(&mut self, ptr: *const u8) -> Option<&mut [u8]> {
        let index = self.position(ptr)?;
        let entry = &mut self.entries[index];
        let len = entry.handle.len;
        Some(match &mut entry.storage {
            Storage::Copy(bytes) => &mut bytes[..len],
            Storage::Vendor(_) => unsafe { slice::from_raw_parts_mut(entry.handle.ptr, len) },
        })
    }

    /// Release the buffer at `ptr` if it is outstanding.
    ///
    /// Returns `false` for null, already-freed, or never-issued addresses and
    /// leaves the ledger untouched.
    pub fn free(&mut self, ptr: *const u8, vendor: &dyn VendorApi) -> bool {
        match self.position(ptr) {
            Some(index) => {
                self.entries.swap_remove(index).release(vendor);
                true
            }
            None => false,
        }
    }

    /// Release every outstanding buffer. Returns how many were released.
    pub fn release_all(&mut self, vendor: &dyn VendorApi) -> usize {
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            entry.release(vendor);
        }
        count
    }
}

impl Drop for BufferLedger {
    fn drop(&mut self) {
        // Vendor buffers can only be released by their vendor; the slide must
        // have drained them already.
        let leaked = self
            .entries
            .iter()
            .filter(|e| matches!(e.storage, Storage::Vendor(_)))
            .count();
        if leaked > 0 {
            warn!("{} vendor buffers dropped without release", leaked);
        }
    }
}
