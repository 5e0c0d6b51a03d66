use serde::*;

/// A tile coordinate, packed as `(row << 16) | col`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
#[repr(transparent)]
pub struct Location {
    packed: u32,
}

impl Location {
    pub fn new(row: usize, col: usize) -> Self {
        Location {
            packed: ((row as u32) << 16) | (col as u32 & 0xFFFF),
        }
    }

    #[inline]
    pub fn row(self) -> usize {
        (self.packed >> 16) as usize
    }

    #[inline]
    pub fn col(self) -> usize {
        (self.packed & 0xFFFF) as usize
    }

    /// Flat grid key (`row * width + col`).
    #[inline]
    pub fn key(self, width: usize) -> usize {
        self.row() * width + self.col()
    }

    #[inline]
    pub fn from_key(key: usize, width: usize) -> Self {
        Location::new(key / width, key % width)
    }

    #[inline]
    pub fn packed_repr(self) -> u32 {
        self.packed
    }

    #[inline]
    pub fn from_packed(packed: u32) -> Self {
        Location { packed }
    }

    /// Chebyshev distance.
    pub fn distance_to(self, other: Self) -> usize {
        let dr = self.row().abs_diff(other.row());
        let dc = self.col().abs_diff(other.col());

        dr.max(dc)
    }

    pub fn manhattan_to(self, other: Self) -> usize {
        self.row().abs_diff(other.row()) + self.col().abs_diff(other.col())
    }
}

impl Serialize for Location {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.packed_repr().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u32::deserialize(deserializer).map(Location::from_packed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_matches_row_major_index() {
        let loc = Location::new(3, 7);
        assert_eq!(loc.key(10), 37);
        assert_eq!(Location::from_key(37, 10), loc);
    }

    #[test]
    fn distances() {
        let a = Location::new(1, 1);
        let b = Location::new(4, 3);
        assert_eq!(a.distance_to(b), 3);
        assert_eq!(a.manhattan_to(b), 5);
    }
}
