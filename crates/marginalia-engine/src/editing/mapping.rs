/// Which side a position sticks to when content is inserted exactly at it
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

/// A single replaced range, in coordinates of the document before the step
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MappedRange {
    pub start: usize,
    pub old_size: usize,
    pub new_size: usize,
}

/// Position map produced by one step
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<MappedRange>,
}

impl StepMap {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn replace(start: usize, old_size: usize, new_size: usize) -> Self {
        if old_size == 0 && new_size == 0 {
            return Self::identity();
        }
        Self {
            ranges: vec![MappedRange {
                start,
                old_size,
                new_size,
            }],
        }
    }

    pub fn ranges(&self) -> &[MappedRange] {
        &self.ranges
    }

    pub fn is_identity(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Map a position in the old document to the new one.
    ///
    /// Positions inside a replaced range move to its start or end: the
    /// start boundary sticks before, the end boundary sticks after, and an
    /// interior position or a pure insertion point follows `assoc`.
    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        let mut diff: isize = 0;
        for range in &self.ranges {
            if range.start > pos {
                break;
            }
            let end = range.start + range.old_size;
            if pos <= end {
                let side = if range.old_size == 0 {
                    assoc
                } else if pos == range.start {
                    Assoc::Before
                } else if pos == end {
                    Assoc::After
                } else {
                    assoc
                };
                let offset = match side {
                    Assoc::Before => 0,
                    Assoc::After => range.new_size as isize,
                };
                return (range.start as isize + diff + offset).max(0) as usize;
            }
            diff += range.new_size as isize - range.old_size as isize;
        }
        (pos as isize + diff).max(0) as usize
    }
}

/// Composition of the step maps of a transaction, applied in order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn is_identity(&self) -> bool {
        self.maps.iter().all(StepMap::is_identity)
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, assoc))
    }
}
