use std::borrow::Cow;
use std::collections::{BTreeSet, VecDeque};
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// 标准棋盘边长。
pub const BOARD_SIZE: u8 = 9;
/// 每位玩家开局持有的墙数。
pub const WALLS_PER_PLAYER: u8 = 10;
pub const MIN_BOARD_SIZE: u8 = 3;
pub const MAX_BOARD_SIZE: u8 = 19;

static STANDARD_WALL_SLOTS: Lazy<Vec<(WallSegment, WallSegment)>> =
    Lazy::new(|| enumerate_wall_slots(BOARD_SIZE));

/// 棋盘上的格子。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: u8,
    pub col: u8,
}

impl Position {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// 沿 `direction` 的相邻格；越出边长为 `size` 的棋盘时返回 `None`。
    pub fn step(self, direction: Direction, size: u8) -> Option<Position> {
        let (d_row, d_col) = direction.delta();
        let row = self.row.checked_add_signed(d_row)?;
        let col = self.col.checked_add_signed(d_col)?;
        (row < size && col < size).then_some(Position { row, col })
    }

    pub fn manhattan(self, other: Position) -> u8 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    pub fn is_adjacent(self, other: Position) -> bool {
        self.manhattan(other) == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(self) -> (i8, i8) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    /// 与当前方向垂直的两个方向。
    pub fn perpendicular(self) -> [Direction; 2] {
        match self {
            Direction::Up | Direction::Down => [Direction::Left, Direction::Right],
            Direction::Left | Direction::Right => [Direction::Up, Direction::Down],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum WallOrientation {
    Horizontal,
    Vertical,
}

impl WallOrientation {
    pub fn opposite(self) -> Self {
        match self {
            WallOrientation::Horizontal => WallOrientation::Vertical,
            WallOrientation::Vertical => WallOrientation::Horizontal,
        }
    }
}

impl FromStr for WallOrientation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "horizontal" | "h" => Ok(WallOrientation::Horizontal),
            "vertical" | "v" => Ok(WallOrientation::Vertical),
            _ => Err(()),
        }
    }
}

/// 半堵墙（墙段）。
///
/// 横向墙段 `(row, col)` 位于第 `row` 行与第 `row + 1` 行之间、第 `col` 列下方；
/// 纵向墙段 `(row, col)` 位于第 `col` 列与第 `col + 1` 列之间、第 `row` 行旁边。
/// 两个坐标的取值范围都是 `[0, size - 2]`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WallSegment {
    #[serde(alias = "wallType")]
    pub orientation: WallOrientation,
    pub row: u8,
    pub col: u8,
}

impl WallSegment {
    pub const fn new(orientation: WallOrientation, row: u8, col: u8) -> Self {
        Self {
            orientation,
            row,
            col,
        }
    }

    pub const fn horizontal(row: u8, col: u8) -> Self {
        Self::new(WallOrientation::Horizontal, row, col)
    }

    pub const fn vertical(row: u8, col: u8) -> Self {
        Self::new(WallOrientation::Vertical, row, col)
    }

    pub fn key(self) -> (u8, u8) {
        (self.row, self.col)
    }

    pub fn in_bounds(self, size: u8) -> bool {
        let limit = size.saturating_sub(1);
        self.row < limit && self.col < limit
    }

    /// 能与本段组成整墙的共线相邻段。
    pub fn adjacent_second_segments(self, size: u8) -> Vec<WallSegment> {
        let mut segments = Vec::with_capacity(2);
        if !self.in_bounds(size) {
            return segments;
        }
        let last = size - 2;
        match self.orientation {
            WallOrientation::Horizontal => {
                if self.col > 0 {
                    segments.push(Self::horizontal(self.row, self.col - 1));
                }
                if self.col < last {
                    segments.push(Self::horizontal(self.row, self.col + 1));
                }
            }
            WallOrientation::Vertical => {
                if self.row > 0 {
                    segments.push(Self::vertical(self.row - 1, self.col));
                }
                if self.row < last {
                    segments.push(Self::vertical(self.row + 1, self.col));
                }
            }
        }
        segments
    }
}

/// 两段墙的几何中心（格坐标）。
pub fn wall_center(first: WallSegment, second: WallSegment) -> (f64, f64) {
    (
        (first.row as f64 + second.row as f64) / 2.0,
        (first.col as f64 + second.col as f64) / 2.0,
    )
}

/// 单一方向上已占用的墙段键。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WallSet(BTreeSet<(u8, u8)>);

impl WallSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, row: u8, col: u8) -> bool {
        self.0.contains(&(row, col))
    }

    pub fn insert(&mut self, row: u8, col: u8) -> bool {
        self.0.insert((row, col))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.0.iter().copied()
    }
}

/// 棋盘格与墙，负责相邻与连通性查询。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardGraph {
    size: u8,
    #[serde(default)]
    horizontal: WallSet,
    #[serde(default)]
    vertical: WallSet,
}

impl BoardGraph {
    pub fn new(size: u8) -> Self {
        Self {
            size,
            horizontal: WallSet::new(),
            vertical: WallSet::new(),
        }
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn horizontal(&self) -> &WallSet {
        &self.horizontal
    }

    pub fn vertical(&self) -> &WallSet {
        &self.vertical
    }

    pub fn walls(&self, orientation: WallOrientation) -> &WallSet {
        match orientation {
            WallOrientation::Horizontal => &self.horizontal,
            WallOrientation::Vertical => &self.vertical,
        }
    }

    fn walls_mut(&mut self, orientation: WallOrientation) -> &mut WallSet {
        match orientation {
            WallOrientation::Horizontal => &mut self.horizontal,
            WallOrientation::Vertical => &mut self.vertical,
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.size && pos.col < self.size
    }

    pub fn is_occupied(&self, segment: WallSegment) -> bool {
        self.walls(segment.orientation)
            .contains(segment.row, segment.col)
    }

    /// 垂直方向上是否已有同键墙段（交叉）。
    pub fn is_crossed(&self, segment: WallSegment) -> bool {
        self.walls(segment.orientation.opposite())
            .contains(segment.row, segment.col)
    }

    /// 直接插入两段墙，不做合法性检查；正式落墙走 `RuleEngine`。
    pub fn insert_wall(&mut self, first: WallSegment, second: WallSegment) {
        self.walls_mut(first.orientation).insert(first.row, first.col);
        self.walls_mut(second.orientation)
            .insert(second.row, second.col);
    }

    /// 加上一堵墙后的临时副本。
    pub fn with_wall(&self, first: WallSegment, second: WallSegment) -> BoardGraph {
        let mut scratch = self.clone();
        scratch.insert_wall(first, second);
        scratch
    }

    /// 两个方向上已放置的墙段总数。
    pub fn segment_count(&self) -> usize {
        self.horizontal.len() + self.vertical.len()
    }

    /// 两个正交相邻格之间是否有墙；不相邻的格对永远视为未阻挡。
    pub fn is_edge_blocked(&self, a: Position, b: Position) -> bool {
        if !a.is_adjacent(b) {
            return false;
        }
        if a.row == b.row {
            self.vertical.contains(a.row, a.col.min(b.col))
        } else {
            self.horizontal.contains(a.row.min(b.row), a.col)
        }
    }

    /// 从 `pos` 不穿墙可达的棋盘内相邻格。
    pub fn open_neighbours(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |direction| pos.step(direction, self.size))
            .filter(move |next| !self.is_edge_blocked(pos, *next))
    }

    /// 从 `start` 到 `target_row` 任一格的最少步数（BFS），不可达时返回 `None`。
    pub fn shortest_distance(&self, start: Position, target_row: u8) -> Option<u32> {
        assert!(
            self.contains(start),
            "path search started off the board at {start:?}"
        );
        if start.row == target_row {
            return Some(0);
        }

        let size = self.size as usize;
        let mut visited = vec![false; size * size];
        let mut queue = VecDeque::with_capacity(size * size);
        visited[self.index(start)] = true;
        queue.push_back((start, 0u32));

        while let Some((pos, distance)) = queue.pop_front() {
            for next in self.open_neighbours(pos) {
                let idx = self.index(next);
                if visited[idx] {
                    continue;
                }
                if next.row == target_row {
                    return Some(distance + 1);
                }
                visited[idx] = true;
                queue.push_back((next, distance + 1));
            }
        }

        None
    }

    pub fn has_path(&self, start: Position, target_row: u8) -> bool {
        self.shortest_distance(start, target_row).is_some()
    }

    fn index(&self, pos: Position) -> usize {
        pos.row as usize * self.size as usize + pos.col as usize
    }
}

/// 边长为 `size` 的棋盘上所有整墙位置，按行优先排列，同一位置横墙在前。
pub fn wall_slots(size: u8) -> Cow<'static, [(WallSegment, WallSegment)]> {
    if size == BOARD_SIZE {
        Cow::Borrowed(STANDARD_WALL_SLOTS.as_slice())
    } else {
        Cow::Owned(enumerate_wall_slots(size))
    }
}

fn enumerate_wall_slots(size: u8) -> Vec<(WallSegment, WallSegment)> {
    let mut slots = Vec::new();
    for row in 0..size.saturating_sub(1) {
        for col in 0..size.saturating_sub(1) {
            if col + 2 < size {
                slots.push((
                    WallSegment::horizontal(row, col),
                    WallSegment::horizontal(row, col + 1),
                ));
            }
            if row + 2 < size {
                slots.push((
                    WallSegment::vertical(row, col),
                    WallSegment::vertical(row + 1, col),
                ));
            }
        }
    }
    slots
}
