//! Byte-addressable backing stores.
//!
//! A `DataAccess` is a growable array of 32-bit words plus a small block of
//! integer header slots, persisted as one file:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     magic: u32 ("WGDA")
//! 4       4     format_version: u32
//! 8       4     segment_bytes: u32
//! 12      4     version: u32 (flush counter)
//! 16      8     payload_bytes: u64
//! 24      80    header slots: i32 x 20
//! 104     24    reserved
//! 128     ...   payload, i32 LE words
//! ```
//!
//! Capacity grows in whole segments and never shrinks implicitly. Two
//! backings exist: an in-memory segmented array written out on flush, and a
//! memory-mapped file.

mod dir;
mod mmap;
mod ram;

pub use dir::{AccessMode, Directory};

use std::path::{Path, PathBuf};

use waygraph_common::{Error, Result};

use mmap::MmapBacking;
use ram::RamBacking;

const MAGIC: u32 = 0x5747_4441; // "WGDA"
const FORMAT_VERSION: u32 = 1;

/// Number of i32 header slots per store.
pub const HEADER_SLOTS: usize = 20;

/// Bytes reserved at the start of every store file.
pub const HEADER_BYTES: usize = 128;

/// Default growth granularity.
pub const DEFAULT_SEGMENT_BYTES: usize = 1 << 20;

/// Shared lifecycle of everything that persists into a [`Directory`].
pub trait Storable {
    /// Allocate a fresh, empty store. `size_hint` is implementation-defined
    /// (bytes for a raw store, record counts higher up).
    fn create_new(&mut self, size_hint: usize) -> Result<()>;

    /// Open the backing file if present. Returns `false` when nothing exists
    /// yet; fails hard on any format disagreement.
    fn load_existing(&mut self) -> Result<bool>;

    fn flush(&mut self) -> Result<()>;

    fn close(&mut self);

    /// Current payload capacity in bytes.
    fn capacity(&self) -> usize;
}

pub(crate) enum Backing {
    Ram(RamBacking),
    Mmap(MmapBacking),
}

/// One segmented word store bound to a file.
pub struct DataAccess {
    path: PathBuf,
    segment_bytes: usize,
    segment_configured: bool,
    version: u32,
    header: [i32; HEADER_SLOTS],
    initialized: bool,
    backing: Backing,
}

impl DataAccess {
    pub(crate) fn ram<P: AsRef<Path>>(path: P) -> Self {
        Self::with_backing(path, Backing::Ram(RamBacking::new()))
    }

    pub(crate) fn mmap<P: AsRef<Path>>(path: P) -> Self {
        Self::with_backing(path, Backing::Mmap(MmapBacking::new()))
    }

    fn with_backing<P: AsRef<Path>>(path: P, backing: Backing) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            segment_bytes: DEFAULT_SEGMENT_BYTES,
            segment_configured: false,
            version: 0,
            header: [0; HEADER_SLOTS],
            initialized: false,
            backing,
        }
    }

    fn label(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Configure the growth granularity. Only allowed before the store is
    /// created or loaded; must be a positive multiple of 4.
    pub fn set_segment_size(&mut self, bytes: usize) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized(self.label()));
        }
        assert!(
            bytes > 0 && bytes % 4 == 0,
            "segment size must be a positive multiple of 4, got {bytes}"
        );
        self.segment_bytes = bytes;
        self.segment_configured = true;
        Ok(())
    }

    pub fn segment_size(&self) -> usize {
        self.segment_bytes
    }

    /// Flush counter; bumped on every successful flush.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Read the word at `index`.
    #[inline]
    pub fn get_int(&self, index: usize) -> i32 {
        match &self.backing {
            Backing::Ram(b) => b.get_int(self.segment_bytes, index),
            Backing::Mmap(b) => b.get_int(index),
        }
    }

    /// Write the word at `index`. The index must already be within capacity.
    #[inline]
    pub fn set_int(&mut self, index: usize, value: i32) {
        match &mut self.backing {
            Backing::Ram(b) => b.set_int(self.segment_bytes, index, value),
            Backing::Mmap(b) => b.set_int(index, value),
        }
    }

    pub fn get_header(&self, slot: usize) -> i32 {
        self.header[slot]
    }

    pub fn set_header(&mut self, slot: usize, value: i32) {
        self.header[slot] = value;
    }

    /// Grow to at least `bytes` of payload, rounded up to whole segments.
    /// Never shrinks.
    pub fn ensure_capacity(&mut self, bytes: usize) -> Result<()> {
        if bytes <= self.capacity() {
            return Ok(());
        }
        let segments = bytes.div_ceil(self.segment_bytes);
        match &mut self.backing {
            Backing::Ram(b) => b.grow_to(self.segment_bytes, segments),
            Backing::Mmap(b) => b.resize_to(self.segment_bytes, segments)?,
        }
        Ok(())
    }

    /// Drop segments beyond `bytes`.
    pub fn trim_to(&mut self, bytes: usize) -> Result<()> {
        let segments = bytes.div_ceil(self.segment_bytes);
        match &mut self.backing {
            Backing::Ram(b) => b.trim_to(segments),
            Backing::Mmap(b) => b.trim_to(self.segment_bytes, segments)?,
        }
        Ok(())
    }
}

impl Storable for DataAccess {
    fn create_new(&mut self, size_hint: usize) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized(self.label()));
        }
        let segments = size_hint.div_ceil(self.segment_bytes).max(1);
        match &mut self.backing {
            Backing::Ram(b) => b.grow_to(self.segment_bytes, segments),
            Backing::Mmap(b) => b.create(&self.path, self.segment_bytes, segments)?,
        }
        self.version = 0;
        self.header = [0; HEADER_SLOTS];
        self.initialized = true;
        let label = self.label();
        tracing::debug!(file = %label, bytes = self.capacity(), "created store");
        Ok(())
    }

    fn load_existing(&mut self) -> Result<bool> {
        if self.initialized {
            return Err(Error::AlreadyInitialized(self.label()));
        }
        if !self.path.exists() {
            return Ok(false);
        }
        let label = self.label();
        let meta = match &mut self.backing {
            Backing::Ram(b) => b.load(&self.path, &label)?,
            Backing::Mmap(b) => b.load(&self.path, &label)?,
        };
        if self.segment_configured && meta.segment_bytes != self.segment_bytes {
            return Err(Error::InvalidFormat(format!(
                "{label}: segment size {} on disk, {} configured",
                meta.segment_bytes, self.segment_bytes
            )));
        }
        self.segment_bytes = meta.segment_bytes;
        self.version = meta.version;
        self.header = meta.header;
        self.initialized = true;
        tracing::debug!(file = %label, bytes = self.capacity(), version = self.version, "loaded store");
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        assert!(self.initialized, "flush on uninitialized store");
        self.version += 1;
        match &mut self.backing {
            Backing::Ram(b) => {
                b.write_file(&self.path, self.segment_bytes, self.version, &self.header)?
            }
            Backing::Mmap(b) => b.write_header(self.segment_bytes, self.version, &self.header)?,
        }
        Ok(())
    }

    fn close(&mut self) {
        match &mut self.backing {
            Backing::Ram(b) => b.close(),
            Backing::Mmap(b) => b.close(),
        }
        self.initialized = false;
    }

    fn capacity(&self) -> usize {
        match &self.backing {
            Backing::Ram(b) => b.capacity(self.segment_bytes),
            Backing::Mmap(b) => b.capacity(),
        }
    }
}

/// Preamble and header slots as read back from a store file.
pub(crate) struct LoadedMeta {
    pub segment_bytes: usize,
    pub version: u32,
    pub header: [i32; HEADER_SLOTS],
}

/// Encode preamble + header slots into the fixed 128-byte block.
pub(crate) fn encode_header_block(
    segment_bytes: usize,
    version: u32,
    payload_bytes: u64,
    header: &[i32; HEADER_SLOTS],
) -> [u8; HEADER_BYTES] {
    let mut block = [0u8; HEADER_BYTES];
    block[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    block[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    block[8..12].copy_from_slice(&(segment_bytes as u32).to_le_bytes());
    block[12..16].copy_from_slice(&version.to_le_bytes());
    block[16..24].copy_from_slice(&payload_bytes.to_le_bytes());
    for (i, slot) in header.iter().enumerate() {
        let off = 24 + i * 4;
        block[off..off + 4].copy_from_slice(&slot.to_le_bytes());
    }
    block
}

/// Decode and validate the 128-byte header block. `file_bytes` is the total
/// file size, used to reject truncated payloads.
pub(crate) fn decode_header_block(
    block: &[u8],
    file_bytes: u64,
    label: &str,
) -> Result<(LoadedMeta, u64)> {
    if block.len() < HEADER_BYTES {
        return Err(Error::InvalidFormat(format!("{label}: truncated header")));
    }
    let magic = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
    if magic != MAGIC {
        return Err(Error::InvalidFormat(format!(
            "{label}: bad magic {magic:08x}"
        )));
    }
    let format = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    if format != FORMAT_VERSION {
        return Err(Error::VersionMismatch(format!(
            "{label}: file format {format}, supported {FORMAT_VERSION}"
        )));
    }
    let segment_bytes = u32::from_le_bytes([block[8], block[9], block[10], block[11]]) as usize;
    if segment_bytes == 0 || segment_bytes % 4 != 0 {
        return Err(Error::InvalidFormat(format!(
            "{label}: invalid segment size {segment_bytes}"
        )));
    }
    let version = u32::from_le_bytes([block[12], block[13], block[14], block[15]]);
    let payload_bytes = u64::from_le_bytes([
        block[16], block[17], block[18], block[19], block[20], block[21], block[22], block[23],
    ]);
    if HEADER_BYTES as u64 + payload_bytes > file_bytes {
        return Err(Error::InvalidFormat(format!(
            "{label}: payload of {payload_bytes} bytes exceeds file size {file_bytes}"
        )));
    }
    if payload_bytes % segment_bytes as u64 != 0 {
        return Err(Error::InvalidFormat(format!(
            "{label}: payload {payload_bytes} not segment-aligned"
        )));
    }
    let mut header = [0i32; HEADER_SLOTS];
    for (i, slot) in header.iter_mut().enumerate() {
        let off = 24 + i * 4;
        *slot = i32::from_le_bytes([block[off], block[off + 1], block[off + 2], block[off + 3]]);
    }
    Ok((
        LoadedMeta {
            segment_bytes,
            version,
            header,
        },
        payload_bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backends(dir: &TempDir) -> Vec<DataAccess> {
        vec![
            DataAccess::ram(dir.path().join("ram_store")),
            DataAccess::mmap(dir.path().join("mmap_store")),
        ]
    }

    #[test]
    fn set_get_roundtrip_both_backings() {
        let dir = TempDir::new().unwrap();
        for mut da in backends(&dir) {
            da.set_segment_size(128).unwrap();
            da.create_new(256).unwrap();
            da.set_int(0, 42);
            da.set_int(31, -7);
            assert_eq!(da.get_int(0), 42);
            assert_eq!(da.get_int(31), -7);
            assert_eq!(da.get_int(1), 0);
        }
    }

    #[test]
    fn capacity_grows_in_whole_segments() {
        let dir = TempDir::new().unwrap();
        for mut da in backends(&dir) {
            da.set_segment_size(64).unwrap();
            da.create_new(0).unwrap();
            assert_eq!(da.capacity(), 64);

            da.ensure_capacity(65).unwrap();
            assert_eq!(da.capacity(), 128);

            // Never shrinks.
            da.ensure_capacity(10).unwrap();
            assert_eq!(da.capacity(), 128);

            da.trim_to(64).unwrap();
            assert_eq!(da.capacity(), 64);
        }
    }

    #[test]
    fn flush_and_reload_preserves_payload_and_header() {
        let dir = TempDir::new().unwrap();
        for name in ["ram_rt", "mmap_rt"] {
            let path = dir.path().join(name);
            let ram = name.starts_with("ram");
            let mut da = if ram {
                DataAccess::ram(&path)
            } else {
                DataAccess::mmap(&path)
            };
            da.set_segment_size(128).unwrap();
            da.create_new(128).unwrap();
            da.set_int(3, 1234);
            da.set_header(0, -99);
            da.set_header(19, 7);
            da.flush().unwrap();
            assert_eq!(da.version(), 1);
            da.close();

            let mut reloaded = if ram {
                DataAccess::ram(&path)
            } else {
                DataAccess::mmap(&path)
            };
            assert!(reloaded.load_existing().unwrap());
            assert_eq!(reloaded.get_int(3), 1234);
            assert_eq!(reloaded.get_header(0), -99);
            assert_eq!(reloaded.get_header(19), 7);
            assert_eq!(reloaded.version(), 1);
            assert_eq!(reloaded.segment_size(), 128);
        }
    }

    #[test]
    fn load_missing_returns_false() {
        let dir = TempDir::new().unwrap();
        let mut da = DataAccess::ram(dir.path().join("nothing"));
        assert!(!da.load_existing().unwrap());
    }

    #[test]
    fn segment_size_mismatch_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seg");
        let mut da = DataAccess::ram(&path);
        da.set_segment_size(128).unwrap();
        da.create_new(128).unwrap();
        da.flush().unwrap();

        let mut other = DataAccess::ram(&path);
        other.set_segment_size(256).unwrap();
        let err = other.load_existing().unwrap_err();
        assert!(err.to_string().contains("segment size"));
    }

    #[test]
    fn truncated_payload_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trunc");
        let mut da = DataAccess::ram(&path);
        da.set_segment_size(128).unwrap();
        da.create_new(256).unwrap();
        da.flush().unwrap();

        let full = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(full - 10).unwrap();

        let mut other = DataAccess::ram(&path);
        let err = other.load_existing().unwrap_err();
        assert!(err.to_string().contains("exceeds file size"), "{err}");
    }

    #[test]
    fn double_initialization_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut da = DataAccess::ram(dir.path().join("twice"));
        da.create_new(64).unwrap();
        assert!(da.create_new(64).is_err());
        assert!(da.load_existing().is_err());
        assert!(da.set_segment_size(64).is_err());
    }

    #[test]
    fn version_counts_flushes() {
        let dir = TempDir::new().unwrap();
        let mut da = DataAccess::ram(dir.path().join("ver"));
        da.create_new(64).unwrap();
        assert_eq!(da.version(), 0);
        da.flush().unwrap();
        da.flush().unwrap();
        assert_eq!(da.version(), 2);
    }
}
