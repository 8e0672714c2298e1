//! In-memory segmented backing, persisted by writing the whole store on
//! flush.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use waygraph_common::Result;

use super::{decode_header_block, encode_header_block, LoadedMeta, HEADER_BYTES, HEADER_SLOTS};

pub(crate) struct RamBacking {
    segments: Vec<Box<[i32]>>,
}

impl RamBacking {
    pub(crate) fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub(crate) fn capacity(&self, segment_bytes: usize) -> usize {
        self.segments.len() * segment_bytes
    }

    #[inline]
    pub(crate) fn get_int(&self, segment_bytes: usize, index: usize) -> i32 {
        let words = segment_bytes / 4;
        let seg = index / words;
        assert!(seg < self.segments.len(), "word index {index} out of bounds");
        self.segments[seg][index % words]
    }

    #[inline]
    pub(crate) fn set_int(&mut self, segment_bytes: usize, index: usize, value: i32) {
        let words = segment_bytes / 4;
        let seg = index / words;
        assert!(seg < self.segments.len(), "word index {index} out of bounds");
        self.segments[seg][index % words] = value;
    }

    pub(crate) fn grow_to(&mut self, segment_bytes: usize, segments: usize) {
        let words = segment_bytes / 4;
        while self.segments.len() < segments {
            self.segments.push(vec![0i32; words].into_boxed_slice());
        }
    }

    pub(crate) fn trim_to(&mut self, segments: usize) {
        self.segments.truncate(segments);
    }

    pub(crate) fn close(&mut self) {
        self.segments.clear();
    }

    pub(crate) fn write_file(
        &self,
        path: &Path,
        segment_bytes: usize,
        version: u32,
        header: &[i32; HEADER_SLOTS],
    ) -> Result<()> {
        let payload_bytes = (self.segments.len() * segment_bytes) as u64;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&encode_header_block(
            segment_bytes,
            version,
            payload_bytes,
            header,
        ))?;

        let mut buf = Vec::with_capacity(segment_bytes);
        for segment in &self.segments {
            buf.clear();
            for &word in segment.iter() {
                buf.extend_from_slice(&word.to_le_bytes());
            }
            writer.write_all(&buf)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub(crate) fn load(&mut self, path: &Path, label: &str) -> Result<LoadedMeta> {
        let mut file = File::open(path)?;
        let file_bytes = file.metadata()?.len();

        let mut block = [0u8; HEADER_BYTES];
        file.read_exact(&mut block).map_err(|_| {
            waygraph_common::Error::InvalidFormat(format!("{label}: truncated header"))
        })?;
        let (meta, payload_bytes) = decode_header_block(&block, file_bytes, label)?;

        let words = meta.segment_bytes / 4;
        let segment_count = payload_bytes as usize / meta.segment_bytes;
        self.segments = Vec::with_capacity(segment_count);
        let mut raw = vec![0u8; meta.segment_bytes];
        for _ in 0..segment_count {
            file.read_exact(&mut raw)?;
            let mut segment = vec![0i32; words].into_boxed_slice();
            for (i, word) in segment.iter_mut().enumerate() {
                let off = i * 4;
                *word = i32::from_le_bytes([raw[off], raw[off + 1], raw[off + 2], raw[off + 3]]);
            }
            self.segments.push(segment);
        }
        Ok(meta)
    }
}
