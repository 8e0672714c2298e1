//! Memory-mapped backing. Word reads and writes go straight through the
//! map; growth extends the file and remaps.

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::MmapMut;
use waygraph_common::{Error, Result};

use super::{decode_header_block, encode_header_block, LoadedMeta, HEADER_BYTES, HEADER_SLOTS};

pub(crate) struct MmapBacking {
    file: Option<File>,
    map: Option<MmapMut>,
}

impl MmapBacking {
    pub(crate) fn new() -> Self {
        Self {
            file: None,
            map: None,
        }
    }

    fn map(&self) -> &MmapMut {
        self.map.as_ref().expect("store is not open")
    }

    pub(crate) fn capacity(&self) -> usize {
        self.map
            .as_ref()
            .map(|m| m.len().saturating_sub(HEADER_BYTES))
            .unwrap_or(0)
    }

    #[inline]
    pub(crate) fn get_int(&self, index: usize) -> i32 {
        let map = self.map();
        let off = HEADER_BYTES + index * 4;
        assert!(off + 4 <= map.len(), "word index {index} out of bounds");
        i32::from_le_bytes([map[off], map[off + 1], map[off + 2], map[off + 3]])
    }

    #[inline]
    pub(crate) fn set_int(&mut self, index: usize, value: i32) {
        let map = self.map.as_mut().expect("store is not open");
        let off = HEADER_BYTES + index * 4;
        assert!(off + 4 <= map.len(), "word index {index} out of bounds");
        map[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn create(&mut self, path: &Path, segment_bytes: usize, segments: usize) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len((HEADER_BYTES + segments * segment_bytes) as u64)?;
        // Safety: the map is private to this handle; the build protocol is
        // single-writer and the file is not shared while open.
        let map = unsafe { MmapMut::map_mut(&file)? };
        self.file = Some(file);
        self.map = Some(map);
        Ok(())
    }

    pub(crate) fn resize_to(&mut self, segment_bytes: usize, segments: usize) -> Result<()> {
        let file = self.file.as_ref().expect("store is not open");
        let new_len = (HEADER_BYTES + segments * segment_bytes) as u64;
        // Unmap before resizing the file underneath.
        self.map = None;
        file.set_len(new_len)?;
        self.map = Some(unsafe { MmapMut::map_mut(file)? });
        Ok(())
    }

    pub(crate) fn trim_to(&mut self, segment_bytes: usize, segments: usize) -> Result<()> {
        self.resize_to(segment_bytes, segments)
    }

    pub(crate) fn close(&mut self) {
        self.map = None;
        self.file = None;
    }

    pub(crate) fn write_header(
        &mut self,
        segment_bytes: usize,
        version: u32,
        header: &[i32; HEADER_SLOTS],
    ) -> Result<()> {
        let payload_bytes = self.capacity() as u64;
        let block = encode_header_block(segment_bytes, version, payload_bytes, header);
        let map = self.map.as_mut().expect("store is not open");
        map[..HEADER_BYTES].copy_from_slice(&block);
        map.flush()?;
        Ok(())
    }

    pub(crate) fn load(&mut self, path: &Path, label: &str) -> Result<LoadedMeta> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_bytes = file.metadata()?.len();
        if file_bytes < HEADER_BYTES as u64 {
            return Err(Error::InvalidFormat(format!("{label}: truncated header")));
        }
        let map = unsafe { MmapMut::map_mut(&file)? };
        let (meta, _) = decode_header_block(&map[..HEADER_BYTES], file_bytes, label)?;
        self.file = Some(file);
        self.map = Some(map);
        Ok(meta)
    }
}
