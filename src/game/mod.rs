//! 游戏核心逻辑模块（棋盘图、状态、规则引擎与对局控制）。

pub mod board;
pub mod controller;
pub mod rules;
pub mod state;

pub use board::{
    wall_center,
    wall_slots,
    BoardGraph,
    Direction,
    Position,
    WallOrientation,
    WallSegment,
    WallSet,
    BOARD_SIZE,
    MAX_BOARD_SIZE,
    MIN_BOARD_SIZE,
    WALLS_PER_PLAYER,
};
pub use controller::{AiTurn, GameController, MatchMode};
pub use rules::{RuleEngine, RuleError, RuleResolution, WallRejection};
pub use state::{
    GameEvent, GameState, IntegrityError, InteractionMode, Player, EVENT_LOG_CAPACITY,
};
