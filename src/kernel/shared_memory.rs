//! Process-shared memory
//! Fixed-capacity byte buffer and counter living in MAP_SHARED | MAP_ANONYMOUS mappings, so
//! bytes written on either side of a fork() are visible to the other side without extra IPC.
//!
//! Layout of the output buffer mapping:
//!   [ cursor: AtomicUsize ][ content: capacity bytes ][ NUL ]
//!
//! The content is NUL-terminated at all times, no matter how many bytes were offered.

use crate::config::types::{HarnessError, Result};
use std::ffi::CStr;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::mem::{size_of, ManuallyDrop};
use std::os::unix::io::{FromRawFd, RawFd};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

const HEADER_LEN: usize = size_of::<AtomicUsize>();
const READ_CHUNK: usize = 4096;

/// Owned MAP_SHARED | MAP_ANONYMOUS region, unmapped on drop.
///
/// Only this process and its fork() descendants can reach it.
struct SharedMapping {
    base: NonNull<u8>,
    len: usize,
}

impl SharedMapping {
    fn new(len: usize) -> Result<Self> {
        // SAFETY: anonymous mapping, no fd, kernel picks the address.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(HarnessError::Memory(format!(
                "Unable to map {} shared bytes: {}",
                len,
                std::io::Error::last_os_error()
            )));
        }
        let base = NonNull::new(addr as *mut u8)
            .ok_or_else(|| HarnessError::Memory("mmap returned a null mapping".to_string()))?;
        Ok(Self { base, len })
    }

    /// First word of the mapping, viewed as an atomic counter.
    fn word(&self) -> &AtomicUsize {
        // SAFETY: mappings are page aligned and at least HEADER_LEN long.
        unsafe { &*(self.base.as_ptr() as *const AtomicUsize) }
    }
}

impl Drop for SharedMapping {
    fn drop(&mut self) {
        // SAFETY: base/len come from the successful mmap in new().
        let rc = unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.len) };
        if rc != 0 {
            log::error!(
                "Unable to unmap shared memory: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

pub struct OutputBuffer {
    mapping: SharedMapping,
    capacity: usize,
}

impl OutputBuffer {
    /// Map a zero-initialized shared region able to hold `capacity` bytes plus the terminator.
    pub fn new(capacity: usize) -> Result<Self> {
        let mapping = SharedMapping::new(HEADER_LEN + capacity + 1)?;

        log::debug!(
            "Mapped shared output buffer: capacity={} mapping_len={}",
            capacity,
            mapping.len
        );

        // Anonymous mappings are zero-filled: cursor == 0 and content[0] == NUL already.
        Ok(Self { mapping, capacity })
    }

    fn cursor(&self) -> &AtomicUsize {
        self.mapping.word()
    }

    fn content_ptr(&self) -> *mut u8 {
        // SAFETY: HEADER_LEN < mapping.len by construction.
        unsafe { self.mapping.base.as_ptr().add(HEADER_LEN) }
    }

    /// Maximum number of content bytes held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of content bytes currently held.
    pub fn len(&self) -> usize {
        self.cursor().load(Ordering::Acquire).min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.len()
    }

    /// Append as much of `bytes` as fits; returns the number of bytes kept.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let cursor = self.len();
        let kept = bytes.len().min(self.capacity - cursor);

        // SAFETY: cursor + kept <= capacity, and the terminator slot at
        // index `capacity` is inside the mapping.
        unsafe {
            let dst = self.content_ptr().add(cursor);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, kept);
            *dst.add(kept) = 0;
        }
        self.cursor().store(cursor + kept, Ordering::Release);
        kept
    }

    /// Drain `fd` until end-of-file, keeping what fits and dropping the rest.
    ///
    /// Calling this on a full buffer is fine: everything read is discarded.
    /// The descriptor is left open. Returns the number of bytes kept.
    pub fn read_from(&mut self, fd: RawFd) -> Result<usize> {
        // SAFETY: the caller owns `fd`; ManuallyDrop keeps it open on return.
        let mut source = ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });
        let mut chunk = [0u8; READ_CHUNK];
        let mut kept = 0;
        let mut dropped = 0;

        loop {
            match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let accepted = self.append(&chunk[..n]);
                    kept += accepted;
                    dropped += n - accepted;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(HarnessError::Process(format!(
                        "read(diagnostics fd {}): {}",
                        fd, e
                    )))
                }
            }
        }

        if dropped > 0 {
            log::warn!(
                "Diagnostics exceeded buffer capacity of {} bytes; dropped {} bytes",
                self.capacity,
                dropped
            );
        }
        Ok(kept)
    }

    /// Held content, without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: len() <= capacity, all inside the mapping.
        unsafe { std::slice::from_raw_parts(self.content_ptr(), self.len()) }
    }

    /// NUL-terminated content. Stops early if the content itself contains a NUL.
    pub fn get(&self) -> &CStr {
        // SAFETY: len() + 1 <= capacity + 1, and content[len()] is always 0.
        let with_nul = unsafe { std::slice::from_raw_parts(self.content_ptr(), self.len() + 1) };
        CStr::from_bytes_until_nul(with_nul).unwrap_or_default()
    }

    /// Content as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Forget the content; the mapping stays.
    pub fn clear(&mut self) {
        // SAFETY: index 0 is inside the mapping.
        unsafe {
            *self.content_ptr() = 0;
        }
        self.cursor().store(0, Ordering::Release);
    }
}

/// Counter word shared across fork(), safe to bump from a signal handler.
pub struct SharedCounter {
    mapping: SharedMapping,
}

impl SharedCounter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            mapping: SharedMapping::new(HEADER_LEN)?,
        })
    }

    pub fn get(&self) -> usize {
        self.mapping.word().load(Ordering::SeqCst)
    }

    /// Raw address of the counter, for handing to a signal handler.
    ///
    /// Valid while `self` is alive, in this process and its fork() children.
    pub fn as_ptr(&self) -> *mut AtomicUsize {
        self.mapping.base.as_ptr() as *mut AtomicUsize
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
