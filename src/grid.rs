use crate::location::*;
use serde::{Deserialize, Serialize};

/// Neighbor offsets (row, col) for 8-directional adjacency.
pub const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
];

/// Neighbor offsets (row, col) for 4-directional (cardinal) adjacency.
pub const NEIGHBORS_4: [(i32, i32); 4] = [(-1, 0), (0, 1), (1, 0), (0, -1)];

/// Room membership per tile. Tiles outside the room are either derived walls,
/// doors, or open exterior.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomGrid {
    width: usize,
    height: usize,
    room: Vec<bool>,
}

impl RoomGrid {
    /// A grid with no room tiles.
    pub fn new(width: usize, height: usize) -> RoomGrid {
        RoomGrid {
            width,
            height,
            room: vec![false; width * height],
        }
    }

    /// A grid where every tile is a room tile.
    pub fn filled(width: usize, height: usize) -> RoomGrid {
        RoomGrid {
            width,
            height,
            room: vec![true; width * height],
        }
    }

    /// Build from a row-major membership vector. Returns `None` on a size mismatch.
    pub fn from_cells(width: usize, height: usize, room: Vec<bool>) -> Option<RoomGrid> {
        if room.len() != width * height {
            return None;
        }
        Some(RoomGrid {
            width,
            height,
            room,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.room.len()
    }

    pub fn is_empty(&self) -> bool {
        self.room.is_empty()
    }

    #[inline]
    pub fn in_bounds(&self, row: i32, col: i32) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.height && (col as usize) < self.width
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index / self.width, index % self.width)
    }

    pub fn location(&self, index: usize) -> Location {
        Location::from_key(index, self.width)
    }

    #[inline]
    pub fn is_room(&self, index: usize) -> bool {
        self.room[index]
    }

    /// Bounds-checked room test; anything outside the grid is not room.
    #[inline]
    pub fn is_room_at(&self, row: i32, col: i32) -> bool {
        self.in_bounds(row, col) && self.room[row as usize * self.width + col as usize]
    }

    pub fn set_room(&mut self, index: usize, value: bool) {
        self.room[index] = value;
    }

    /// The in-bounds tile at `(dr, dc)` from `index`.
    #[inline]
    pub fn neighbor(&self, index: usize, dr: i32, dc: i32) -> Option<usize> {
        let (row, col) = self.coords(index);
        let nr = row as i32 + dr;
        let nc = col as i32 + dc;
        if self.in_bounds(nr, nc) {
            Some(nr as usize * self.width + nc as usize)
        } else {
            None
        }
    }

    /// In-bounds 4-neighbors of a tile.
    pub fn neighbors4(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        NEIGHBORS_4
            .iter()
            .filter_map(move |&(dr, dc)| self.neighbor(index, dr, dc))
    }

    pub fn room_count(&self) -> usize {
        self.room.iter().filter(|r| **r).count()
    }

    pub fn room_tiles(&self) -> impl Iterator<Item = usize> + '_ {
        self.room
            .iter()
            .enumerate()
            .filter(|(_, r)| **r)
            .map(|(i, _)| i)
    }

    /// Derived wall rule: not room, 8-adjacent to a room tile, not a door.
    pub fn is_wall(&self, index: usize, doors: &TileSet) -> bool {
        if self.room[index] || doors.contains(index) {
            return false;
        }
        NEIGHBORS_8.iter().any(|&(dr, dc)| {
            self.neighbor(index, dr, dc)
                .map(|n| self.room[n])
                .unwrap_or(false)
        })
    }

    pub fn wall_tiles(&self, doors: &TileSet) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.is_wall(i, doors)).collect()
    }
}

/// A dense per-tile array sized to a grid.
#[derive(Clone, Debug)]
pub struct GridArray<T: Copy> {
    width: usize,
    data: Vec<T>,
}

impl<T: Copy> GridArray<T> {
    pub fn new(width: usize, height: usize, initial: T) -> Self {
        GridArray {
            width,
            data: vec![initial; width * height],
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        self.data[index]
    }

    #[inline]
    pub fn get_rc(&self, row: usize, col: usize) -> T {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        self.data[index] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.data.iter().enumerate()
    }
}

/// A set of flat tile keys backed by a bitmap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileSet {
    bits: Vec<bool>,
    len: usize,
}

impl TileSet {
    pub fn new(size: usize) -> TileSet {
        TileSet {
            bits: vec![false; size],
            len: 0,
        }
    }

    pub fn from_keys(size: usize, keys: impl IntoIterator<Item = usize>) -> TileSet {
        let mut set = TileSet::new(size);
        for key in keys {
            if key < size {
                set.insert(key);
            }
        }
        set
    }

    #[inline]
    pub fn contains(&self, key: usize) -> bool {
        self.bits.get(key).copied().unwrap_or(false)
    }

    /// Returns true if the key was newly inserted.
    pub fn insert(&mut self, key: usize) -> bool {
        if self.bits[key] {
            return false;
        }
        self.bits[key] = true;
        self.len += 1;
        true
    }

    pub fn remove(&mut self, key: usize) -> bool {
        if !self.bits[key] {
            return false;
        }
        self.bits[key] = false;
        self.len -= 1;
        true
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|b| *b = false);
        self.len = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Keys in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(|(i, _)| i)
    }
}

/// Axis-aligned rectangle of tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub row: usize,
    pub col: usize,
    pub height: usize,
    pub width: usize,
}

impl Rect {
    pub fn area(&self) -> usize {
        self.height * self.width
    }
}

/// True iff a BFS from any one room tile reaches every room tile. A grid
/// without room tiles is not connected.
pub fn check_room_connectivity(grid: &RoomGrid) -> bool {
    let start = match grid.room_tiles().next() {
        Some(start) => start,
        None => return false,
    };

    let mut visited = vec![false; grid.len()];
    let mut queue = std::collections::VecDeque::new();
    visited[start] = true;
    queue.push_back(start);
    let mut reached = 1usize;

    while let Some(index) = queue.pop_front() {
        for n in grid.neighbors4(index) {
            if !visited[n] && grid.is_room(n) {
                visited[n] = true;
                reached += 1;
                queue.push_back(n);
            }
        }
    }

    reached == grid.room_count()
}

/// Largest rectangle whose every tile satisfies `usable`, using the
/// per-row histogram and monotonic stack method.
pub fn largest_rectangle<F>(width: usize, height: usize, usable: F) -> Option<Rect>
where
    F: Fn(usize, usize) -> bool,
{
    let mut heights = vec![0usize; width];
    let mut best: Option<Rect> = None;

    for row in 0..height {
        for (col, h) in heights.iter_mut().enumerate() {
            *h = if usable(row, col) { *h + 1 } else { 0 };
        }

        let mut stack: Vec<usize> = Vec::with_capacity(width + 1);
        for col in 0..=width {
            let current = if col < width { heights[col] } else { 0 };
            while let Some(&top) = stack.last() {
                if heights[top] <= current {
                    break;
                }
                stack.pop();
                let h = heights[top];
                let left = stack.last().map(|&l| l + 1).unwrap_or(0);
                let w = col - left;
                if h * w > best.map(|b| b.area()).unwrap_or(0) {
                    best = Some(Rect {
                        row: row + 1 - h,
                        col: left,
                        height: h,
                        width: w,
                    });
                }
            }
            stack.push(col);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::room_from_ascii;

    #[test]
    fn two_blobs_are_not_connected() {
        let grid = room_from_ascii(&["...#...", "...#...", "...#..."]);
        assert!(!check_room_connectivity(&grid));

        let joined = room_from_ascii(&[".......", "...#...", "...#..."]);
        assert!(check_room_connectivity(&joined));
    }

    #[test]
    fn empty_room_is_not_connected() {
        assert!(!check_room_connectivity(&RoomGrid::new(3, 3)));
    }

    #[test]
    fn largest_rectangle_finds_biggest_block() {
        let grid = room_from_ascii(&["..####", "......", "......", "#....."]);
        let rect = largest_rectangle(grid.width(), grid.height(), |r, c| {
            grid.is_room(grid.index(r, c))
        })
        .unwrap();
        assert_eq!(
            rect,
            Rect {
                row: 1,
                col: 1,
                height: 3,
                width: 5
            }
        );
    }

    #[test]
    fn walls_exclude_doors() {
        let grid = room_from_ascii(&["#####", "#...#", "#####"]);
        let mut doors = TileSet::new(grid.len());
        assert_eq!(grid.wall_tiles(&doors).len(), 12);

        doors.insert(grid.index(0, 2));
        assert!(!grid.is_wall(grid.index(0, 2), &doors));
        assert!(!grid.is_wall(grid.index(1, 2), &doors));
        assert_eq!(grid.wall_tiles(&doors).len(), 11);
    }

    #[test]
    fn tile_set_tracks_length() {
        let mut set = TileSet::new(10);
        assert!(set.insert(3));
        assert!(!set.insert(3));
        set.insert(7);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 7]);
        assert!(set.remove(3));
        assert_eq!(set.len(), 1);
    }
}
