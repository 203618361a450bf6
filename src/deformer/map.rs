/// Marker for a driven vertex without a driver counterpart.
pub const UNMAPPED: i32 = -1;

/// Nearest driver vertex per driven vertex, as stored in `vtxIndexMap`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CorrespondenceMap {
    entries: Vec<i32>,
}

impl CorrespondenceMap {
    /// `len` entries, all [`UNMAPPED`].
    #[must_use]
    pub fn unmapped(len: usize) -> Self {
        Self {
            entries: vec![UNMAPPED; len],
        }
    }

    #[must_use]
    pub fn from_entries(entries: Vec<i32>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Driver index for driven vertex `index`; `None` when unmapped or out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<usize> {
        self.entries
            .get(index)
            .and_then(|&entry| usize::try_from(entry).ok())
    }

    pub(crate) fn set(&mut self, index: usize, driver_index: usize) {
        if let (Some(entry), Ok(value)) = (self.entries.get_mut(index), i32::try_from(driver_index)) {
            *entry = value;
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[i32] {
        &self.entries
    }

    #[must_use]
    pub fn mapped_count(&self) -> usize {
        self.entries.iter().filter(|&&entry| entry >= 0).count()
    }

    /// Largest driver index referenced by the map.
    #[must_use]
    pub fn max_driver_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .filter_map(|&entry| usize::try_from(entry).ok())
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_entries_read_as_unmapped() {
        let map = CorrespondenceMap::from_entries(vec![2, UNMAPPED, 0, -7]);
        assert_eq!(map.get(0), Some(2));
        assert_eq!(map.get(1), None);
        assert_eq!(map.get(3), None);
        assert_eq!(map.get(4), None);
        assert_eq!(map.mapped_count(), 2);
        assert_eq!(map.max_driver_index(), Some(2));
    }

    #[test]
    fn fresh_map_is_fully_unmapped() {
        let mut map = CorrespondenceMap::unmapped(3);
        assert_eq!(map.as_slice(), &[UNMAPPED; 3]);
        map.set(1, 9);
        map.set(5, 9);
        assert_eq!(map.as_slice(), &[UNMAPPED, 9, UNMAPPED]);
    }
}
