//! Deduplicating street-name table.
//!
//! Names are stored as `[len_in_words, codepoint, ...]` records in a single
//! store, one UTF-32 code point per word, and addressed by the word offset
//! of their record. Offsets are stable for the lifetime of the storage and
//! equal strings always resolve to equal offsets.
//!
//! Insertion deduplicates with a linear scan over all records, which is
//! O(total words) per insert. That is acceptable for an offline build;
//! anything interactive should put a hash index in front.

use waygraph_common::{Error, Result};

use crate::store::{DataAccess, Storable};

/// Header slot holding the number of interned names.
const H_NAME_COUNT: usize = 0;

pub struct NameIndex {
    store: DataAccess,
    name_count: usize,
    /// Word offset one past the last record.
    used_words: usize,
}

impl NameIndex {
    pub fn new(store: DataAccess) -> Self {
        Self {
            store,
            name_count: 0,
            used_words: 0,
        }
    }

    pub fn name_count(&self) -> usize {
        self.name_count
    }

    /// Intern `name`, returning the word offset of its record. Returns the
    /// existing offset when an equal string was interned before.
    pub fn add(&mut self, name: &str) -> Result<i32> {
        let encoded: Vec<i32> = name.chars().map(|c| c as i32).collect();

        let mut offset = 0usize;
        while offset < self.used_words {
            let len = self.store.get_int(offset) as usize;
            if len == encoded.len() {
                let mut equal = true;
                for (i, &word) in encoded.iter().enumerate() {
                    if self.store.get_int(offset + 1 + i) != word {
                        equal = false;
                        break;
                    }
                }
                if equal {
                    return Ok(offset as i32);
                }
            }
            offset += 1 + len;
        }

        let needed = self.used_words + 1 + encoded.len();
        self.store.ensure_capacity(needed * 4)?;
        self.store.set_int(offset, encoded.len() as i32);
        for (i, &word) in encoded.iter().enumerate() {
            self.store.set_int(offset + 1 + i, word);
        }
        self.used_words = needed;
        self.name_count += 1;
        Ok(offset as i32)
    }

    /// Decode the name record at `offset`.
    pub fn get(&self, offset: i32) -> String {
        assert!(
            offset >= 0 && (offset as usize) < self.used_words,
            "name offset {offset} out of bounds"
        );
        let offset = offset as usize;
        let len = self.store.get_int(offset) as usize;
        assert!(
            offset + 1 + len <= self.used_words,
            "name record at {offset} overruns the table"
        );
        (0..len)
            .map(|i| {
                let word = self.store.get_int(offset + 1 + i) as u32;
                char::from_u32(word).unwrap_or(char::REPLACEMENT_CHARACTER)
            })
            .collect()
    }
}

impl Storable for NameIndex {
    fn create_new(&mut self, size_hint: usize) -> Result<()> {
        self.store.create_new(size_hint)?;
        // Offset 0 always decodes to the empty string, so an unset name
        // reference on an edge stays valid.
        let empty = self.add("")?;
        debug_assert_eq!(empty, 0);
        Ok(())
    }

    fn load_existing(&mut self) -> Result<bool> {
        if !self.store.load_existing()? {
            return Ok(false);
        }
        self.name_count = self.store.get_header(H_NAME_COUNT) as usize;

        // The watermark is not persisted; rebuild it by walking the records.
        let capacity_words = self.store.capacity() / 4;
        let mut offset = 0usize;
        for _ in 0..self.name_count {
            if offset >= capacity_words {
                return Err(Error::Corruption(format!(
                    "name table ends early at word {offset}"
                )));
            }
            let len = self.store.get_int(offset);
            if len < 0 || offset + 1 + len as usize > capacity_words {
                return Err(Error::Corruption(format!(
                    "name record at word {offset} has length {len}"
                )));
            }
            offset += 1 + len as usize;
        }
        self.used_words = offset;
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        self.store.set_header(H_NAME_COUNT, self.name_count as i32);
        self.store.flush()
    }

    fn close(&mut self) {
        self.store.close();
    }

    fn capacity(&self) -> usize {
        self.store.capacity()
    }
}
