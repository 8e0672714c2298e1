//! Turn-by-turn sequence: parallel arrays of indication codes and street
//! names.

/// Turn indication emitted by the path extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Indication {
    ContinueOnStreet = 0,
    TurnLeft = 1,
    TurnRight = 2,
}

impl Indication {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::ContinueOnStreet),
            1 => Some(Self::TurnLeft),
            2 => Some(Self::TurnRight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WayList {
    indications: Vec<Indication>,
    names: Vec<String>,
}

impl WayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            indications: Vec::with_capacity(capacity),
            names: Vec::with_capacity(capacity),
        }
    }

    pub fn size(&self) -> usize {
        self.indications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indications.is_empty()
    }

    pub fn add(&mut self, indication: Indication, name: impl Into<String>) {
        self.ensure_room();
        self.indications.push(indication);
        self.names.push(name.into());
    }

    pub fn set(&mut self, index: usize, indication: Indication, name: impl Into<String>) {
        assert!(index < self.size(), "way index {index} out of bounds");
        self.indications[index] = indication;
        self.names[index] = name.into();
    }

    pub fn indication(&self, index: usize) -> Indication {
        assert!(index < self.size(), "way index {index} out of bounds");
        self.indications[index]
    }

    pub fn name(&self, index: usize) -> &str {
        assert!(index < self.size(), "way index {index} out of bounds");
        &self.names[index]
    }

    /// Reverse both arrays in lockstep.
    pub fn reverse(&mut self) {
        let len = self.size();
        for i in 0..len / 2 {
            self.indications.swap(i, len - 1 - i);
            self.names.swap(i, len - 1 - i);
        }
    }

    pub fn clear(&mut self) {
        self.indications.clear();
        self.names.clear();
    }

    pub fn trim_to_size(&mut self, new_size: usize) {
        assert!(
            new_size <= self.size(),
            "cannot trim {} ways to {new_size}",
            self.size()
        );
        self.indications.truncate(new_size);
        self.names.truncate(new_size);
    }

    fn ensure_room(&mut self) {
        let len = self.indications.len();
        if len == self.indications.capacity() {
            let target = (len * 3 / 2).max(5);
            self.indications.reserve_exact(target - len);
            self.names.reserve_exact(target - len);
        }
    }
}
