use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::board::{
    BoardGraph, Position, WallOrientation, WallSegment, BOARD_SIZE, MAX_BOARD_SIZE,
    MIN_BOARD_SIZE, WALLS_PER_PLAYER,
};
use super::rules::{RuleEngine, RuleError};

/// 玩家座位，序列化为 `1` 或 `2`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "u8", try_from = "u8")]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub const BOTH: [Player; 2] = [Player::One, Player::Two];

    pub fn opponent(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Player::One => 0,
            Player::Two => 1,
        }
    }

    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    /// 玩家一的终点是第 0 行，玩家二是最后一行。
    pub fn goal_row(self, size: u8) -> u8 {
        match self {
            Player::One => 0,
            Player::Two => size.saturating_sub(1),
        }
    }

    pub fn start_row(self, size: u8) -> u8 {
        self.opponent().goal_row(size)
    }

    /// 不考虑墙时 `row` 距终点行的行数。
    pub fn rows_to_goal(self, row: u8, size: u8) -> u8 {
        row.abs_diff(self.goal_row(size))
    }
}

impl From<Player> for u8 {
    fn from(player: Player) -> Self {
        player.number()
    }
}

impl TryFrom<u8> for Player {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(format!("player must be 1 or 2, got {other}")),
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.number())
    }
}

/// 当前玩家的点击含义（交互阶段）。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum InteractionMode {
    #[default]
    Move,
    WallStage1,
    WallStage2,
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InteractionMode::Move => "move",
            InteractionMode::WallStage1 => "wall (first segment)",
            InteractionMode::WallStage2 => "wall (second segment)",
        };
        f.write_str(label)
    }
}

/// 状态里保留的最近事件条数，更早的事件被丢弃。
pub const EVENT_LOG_CAPACITY: usize = 64;

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    GameStarted {
        board_size: u8,
        walls_per_player: u8,
    },
    PawnMoved {
        player: Player,
        from: Position,
        to: Position,
    },
    WallModeChanged {
        player: Player,
        mode: InteractionMode,
    },
    WallSegmentSelected {
        player: Player,
        segment: WallSegment,
    },
    WallSelectionCancelled {
        player: Player,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<RuleError>,
    },
    WallPlaced {
        player: Player,
        first: WallSegment,
        second: WallSegment,
        walls_remaining: u8,
    },
    TurnEnded {
        player: Player,
        turn: u32,
    },
    GameWon {
        winner: Player,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("board size {size} is outside the supported range")]
    InvalidBoardSize { size: u8 },
    #[error("{player} stands off the board at {position:?}")]
    PositionOutOfBounds { player: Player, position: Position },
    #[error("both pawns occupy {position:?}")]
    SharedCell { position: Position },
    #[error("wall segment {segment:?} lies outside the board")]
    SegmentOutOfBounds { segment: WallSegment },
    #[error("wall segment {segment:?} is not part of a full wall")]
    OrphanSegment { segment: WallSegment },
    #[error("horizontal and vertical segments share key ({row}, {col})")]
    CrossingSegments { row: u8, col: u8 },
    #[error("{player} has no path to the goal row")]
    PathBlocked { player: Player },
    #[error("{player} holds {value} walls, more than were handed out")]
    WallCounterOutOfRange { player: Player, value: u8 },
    #[error("{placed} walls on the board but {spent} walls spent")]
    WallCountMismatch { placed: usize, spent: usize },
    #[error("recorded winner {recorded:?} does not match the board ({actual:?})")]
    WinnerMismatch {
        recorded: Option<Player>,
        actual: Option<Player>,
    },
    #[error("first wall segment does not match interaction mode {mode}")]
    DanglingWallSelection { mode: InteractionMode },
}

/// 游戏整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    pub board: BoardGraph,
    pub positions: [Position; 2],
    pub walls_remaining: [u8; 2],
    pub walls_per_player: u8,
    pub current_player: Player,
    #[serde(default)]
    pub mode: InteractionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_wall_segment: Option<WallSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Player>,
    #[serde(default)]
    pub valid_moves: Vec<Position>,
    #[serde(default)]
    pub turn: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
}

impl GameState {
    /// 新对局，棋子位于各自起始行中央。这里不校验尺寸，外部输入请走 `RuleEngine::new_game`。
    pub fn new(board_size: u8, walls_per_player: u8) -> Self {
        let centre = board_size / 2;
        let mut state = Self {
            board: BoardGraph::new(board_size),
            positions: [
                Position::new(Player::One.start_row(board_size), centre),
                Position::new(Player::Two.start_row(board_size), centre),
            ],
            walls_remaining: [walls_per_player; 2],
            walls_per_player,
            current_player: Player::One,
            mode: InteractionMode::Move,
            first_wall_segment: None,
            winner: None,
            valid_moves: Vec::new(),
            turn: 1,
            event_log: Vec::new(),
        };
        state.record_event(GameEvent::GameStarted {
            board_size,
            walls_per_player,
        });
        state.refresh_valid_moves();
        state
    }

    pub fn size(&self) -> u8 {
        self.board.size()
    }

    pub fn position(&self, player: Player) -> Position {
        self.positions[player.index()]
    }

    pub fn active_position(&self) -> Position {
        self.position(self.current_player)
    }

    pub fn walls_left(&self, player: Player) -> u8 {
        self.walls_remaining[player.index()]
    }

    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
        if self.event_log.len() > EVENT_LOG_CAPACITY {
            let excess = self.event_log.len() - EVENT_LOG_CAPACITY;
            self.event_log.drain(..excess);
        }
    }

    /// `player` 绕墙到达终点行的最短距离。
    pub fn goal_distance(&self, player: Player) -> Option<u32> {
        self.board
            .shortest_distance(self.position(player), player.goal_row(self.size()))
    }

    /// 仅由棋子位置推出的胜者。
    pub fn check_winner(&self) -> Option<Player> {
        Player::BOTH
            .into_iter()
            .find(|player| self.position(*player).row == player.goal_row(self.size()))
    }

    pub(crate) fn refresh_valid_moves(&mut self) {
        self.valid_moves = if self.is_finished() {
            Vec::new()
        } else {
            RuleEngine::compute_valid_moves(self)
        };
    }

    pub(crate) fn clear_wall_selection(&mut self) {
        self.mode = InteractionMode::Move;
        self.first_wall_segment = None;
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let size = self.size();
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&size) {
            return Err(IntegrityError::InvalidBoardSize { size });
        }

        for player in Player::BOTH {
            let position = self.position(player);
            if !self.board.contains(position) {
                return Err(IntegrityError::PositionOutOfBounds { player, position });
            }
        }
        if self.positions[0] == self.positions[1] {
            return Err(IntegrityError::SharedCell {
                position: self.positions[0],
            });
        }

        for orientation in [WallOrientation::Horizontal, WallOrientation::Vertical] {
            for (row, col) in self.board.walls(orientation).iter() {
                let segment = WallSegment::new(orientation, row, col);
                if !segment.in_bounds(size) {
                    return Err(IntegrityError::SegmentOutOfBounds { segment });
                }
                if self.board.is_crossed(segment) {
                    return Err(IntegrityError::CrossingSegments { row, col });
                }
            }
            self.check_pairing(orientation)?;
        }

        let mut spent = 0usize;
        for player in Player::BOTH {
            let value = self.walls_left(player);
            if value > self.walls_per_player {
                return Err(IntegrityError::WallCounterOutOfRange { player, value });
            }
            spent += usize::from(self.walls_per_player - value);
        }
        let placed = self.board.segment_count() / 2;
        if placed != spent {
            return Err(IntegrityError::WallCountMismatch { placed, spent });
        }

        for player in Player::BOTH {
            if !self
                .board
                .has_path(self.position(player), player.goal_row(size))
            {
                return Err(IntegrityError::PathBlocked { player });
            }
        }

        let actual = self.check_winner();
        if self.winner != actual {
            return Err(IntegrityError::WinnerMismatch {
                recorded: self.winner,
                actual,
            });
        }

        if (self.mode == InteractionMode::WallStage2) != self.first_wall_segment.is_some() {
            return Err(IntegrityError::DanglingWallSelection { mode: self.mode });
        }

        Ok(())
    }

    /// 每条共线墙段的极大连续段都必须能两两配对。
    fn check_pairing(&self, orientation: WallOrientation) -> Result<(), IntegrityError> {
        // (所在线, 线上偏移)
        let mut lines: Vec<(u8, u8)> = self
            .board
            .walls(orientation)
            .iter()
            .map(|(row, col)| match orientation {
                WallOrientation::Horizontal => (row, col),
                WallOrientation::Vertical => (col, row),
            })
            .collect();
        lines.sort_unstable();

        let mut run_start = 0;
        for i in 1..=lines.len() {
            let continues = i < lines.len()
                && lines[i].0 == lines[i - 1].0
                && lines[i].1 == lines[i - 1].1 + 1;
            if continues {
                continue;
            }
            if (i - run_start) % 2 == 1 {
                let (line, along) = lines[i - 1];
                let segment = match orientation {
                    WallOrientation::Horizontal => WallSegment::horizontal(line, along),
                    WallOrientation::Vertical => WallSegment::vertical(along, line),
                };
                return Err(IntegrityError::OrphanSegment { segment });
            }
            run_start = i;
        }
        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(BOARD_SIZE, WALLS_PER_PLAYER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_matches_starting_layout() {
        let state = GameState::default();
        assert_eq!(state.position(Player::One), Position::new(8, 4));
        assert_eq!(state.position(Player::Two), Position::new(0, 4));
        assert_eq!(state.walls_remaining, [10, 10]);
        assert_eq!(state.current_player, Player::One);
        assert_eq!(state.mode, InteractionMode::Move);
        assert_eq!(state.winner, None);
        assert_eq!(state.valid_moves.len(), 3);
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn player_serializes_as_number() {
        let json = serde_json::to_string(&Player::Two).expect("player should serialize");
        assert_eq!(json, "2");
        let parsed: Player = serde_json::from_str("1").expect("player should parse");
        assert_eq!(parsed, Player::One);
        assert!(serde_json::from_str::<Player>("3").is_err());
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = GameState::default();
        state
            .board
            .insert_wall(WallSegment::horizontal(3, 3), WallSegment::horizontal(3, 4));
        state.walls_remaining[0] -= 1;
        let json = serde_json::to_string(&state).expect("state should serialize");
        let restored: GameState = serde_json::from_str(&json).expect("state should parse");
        assert_eq!(restored, state);
        assert!(restored.integrity_check().is_ok());
    }

    #[test]
    fn event_log_keeps_only_recent_events() {
        let mut state = GameState::default();
        for turn in 0..100 {
            state.record_event(GameEvent::TurnEnded {
                player: Player::One,
                turn,
            });
        }
        assert_eq!(state.event_log.len(), EVENT_LOG_CAPACITY);
        assert_eq!(
            state.event_log.last(),
            Some(&GameEvent::TurnEnded {
                player: Player::One,
                turn: 99
            })
        );
        assert!(!state
            .event_log
            .iter()
            .any(|event| matches!(event, GameEvent::GameStarted { .. })));
    }

    #[test]
    fn integrity_detects_orphan_segment() {
        let mut state = GameState::default();
        state.board.insert_wall(
            WallSegment::vertical(2, 5),
            WallSegment::vertical(2, 5),
        );
        state.walls_remaining[1] -= 1;
        // One segment counted twice leaves a run of length one.
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::OrphanSegment {
                segment: WallSegment::vertical(2, 5)
            })
        );
    }

    #[test]
    fn integrity_detects_crossing_and_count_mismatch() {
        let mut state = GameState::default();
        state
            .board
            .insert_wall(WallSegment::horizontal(4, 4), WallSegment::horizontal(4, 5));
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::WallCountMismatch {
                placed: 1,
                spent: 0
            })
        );

        state.walls_remaining[0] -= 1;
        state
            .board
            .insert_wall(WallSegment::vertical(4, 4), WallSegment::vertical(5, 4));
        state.walls_remaining[1] -= 1;
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::CrossingSegments { row: 4, col: 4 })
        );
    }

    #[test]
    fn integrity_detects_shared_cell_and_winner_mismatch() {
        let mut state = GameState::default();
        state.positions[0] = state.positions[1];
        assert!(matches!(
            state.integrity_check(),
            Err(IntegrityError::SharedCell { .. })
        ));

        let mut state = GameState::default();
        state.positions[0] = Position::new(0, 0);
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::WinnerMismatch {
                recorded: None,
                actual: Some(Player::One)
            })
        );
    }
}
