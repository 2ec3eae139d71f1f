use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::board::{wall_slots, Direction, Position, WallSegment, MAX_BOARD_SIZE, MIN_BOARD_SIZE};
use super::state::{GameEvent, GameState, IntegrityError, InteractionMode, Player};

/// 落墙违反了哪条规则。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum WallRejection {
    #[error("segment lies outside the board")]
    OutOfBounds,
    #[error("segments do not form one straight wall")]
    NotAdjacent,
    #[error("segment is already occupied")]
    Occupied,
    #[error("wall would cross an existing wall")]
    Crossing,
    #[error("wall would cut {player} off from the goal row")]
    BlocksPath { player: Player },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("the game is already over")]
    GameAlreadyOver,
    #[error("{target:?} is not a legal move")]
    IllegalMove { target: Position },
    #[error("illegal wall placement: {reason}")]
    IllegalWall { reason: WallRejection },
    #[error("{player} has no walls left")]
    NoWallsRemaining { player: Player },
    #[error("action needs {expected} mode but the board is in {actual} mode")]
    InvalidMode {
        expected: InteractionMode,
        actual: InteractionMode,
    },
    #[error("it is not {player}'s turn")]
    NotPlayerTurn { player: Player },
    #[error("an AI decision for this turn is still pending")]
    AiTurnPending,
    #[error("the AI decision no longer matches the game")]
    StaleAiDecision,
    #[error("{player} has neither a legal move nor a legal wall")]
    NoLegalAction { player: Player },
    #[error("board size {size} is not supported")]
    InvalidBoardSize { size: u8 },
    #[error("state integrity violated: {error}")]
    IntegrityViolation { error: IntegrityError },
}

impl From<WallRejection> for RuleError {
    fn from(reason: WallRejection) -> Self {
        RuleError::IllegalWall { reason }
    }
}

/// 交给前端的结果：新状态及产生它的事件。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Player>,
}

impl RuleResolution {
    pub fn new(state: GameState, mut events: Vec<GameEvent>) -> Self {
        let winner = state.winner;
        if let Some(winner) = winner {
            let has_event = events
                .iter()
                .any(|event| matches!(event, GameEvent::GameWon { .. }));
            if !has_event {
                events.push(GameEvent::GameWon { winner });
            }
        }

        Self {
            state,
            events,
            winner,
        }
    }
}

/// 规则引擎：先校验再修改，被拒绝的动作不会改变状态。
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine {
    strict: bool,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// 每次修改前都做完整性校验，用于处理来自外部的状态。
    pub fn strict() -> Self {
        Self { strict: true }
    }

    pub fn new_game(board_size: u8, walls_per_player: u8) -> Result<GameState, RuleError> {
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&board_size) {
            return Err(RuleError::InvalidBoardSize { size: board_size });
        }
        info!(board_size, walls_per_player, "new game");
        Ok(GameState::new(board_size, walls_per_player))
    }

    fn ensure_running(state: &GameState) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameAlreadyOver);
        }
        Ok(())
    }

    fn ensure_integrity(&self, state: &GameState) -> Result<(), RuleError> {
        if !self.strict {
            return Ok(());
        }
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    /// 当前行动方的合法落点。
    pub fn compute_valid_moves(state: &GameState) -> Vec<Position> {
        Self::valid_moves_for(state, state.current_player)
    }

    /// 假定轮到 `player` 时的合法落点。
    pub fn valid_moves_for(state: &GameState, player: Player) -> Vec<Position> {
        let size = state.size();
        let board = &state.board;
        let me = state.position(player);
        let opponent = state.position(player.opponent());

        let mut moves = Vec::with_capacity(5);
        let mut admit = |target: Position| {
            if !moves.contains(&target) {
                moves.push(target);
            }
        };

        for direction in Direction::ALL {
            let Some(next) = me.step(direction, size) else {
                continue;
            };
            if board.is_edge_blocked(me, next) {
                continue;
            }
            if next != opponent {
                admit(next);
                continue;
            }

            match opponent.step(direction, size) {
                Some(jump) if !board.is_edge_blocked(opponent, jump) => admit(jump),
                // 对手身后是墙或棋盘边缘：改走斜向。
                _ => {
                    for side in direction.perpendicular() {
                        if let Some(diagonal) = opponent.step(side, size) {
                            if !board.is_edge_blocked(opponent, diagonal) {
                                admit(diagonal);
                            }
                        }
                    }
                }
            }
        }

        moves
    }

    pub fn adjacent_second_segments(state: &GameState, first: WallSegment) -> Vec<WallSegment> {
        first.adjacent_second_segments(state.size())
    }

    /// 按开销从低到高检查当前行动方的落墙规则。
    pub fn check_wall_placement(
        state: &GameState,
        first: WallSegment,
        second: WallSegment,
    ) -> Result<(), RuleError> {
        let player = state.current_player;
        if state.walls_left(player) == 0 {
            return Err(RuleError::NoWallsRemaining { player });
        }

        let size = state.size();
        if !first.in_bounds(size) || !second.in_bounds(size) {
            return Err(WallRejection::OutOfBounds.into());
        }
        if !first.adjacent_second_segments(size).contains(&second) {
            return Err(WallRejection::NotAdjacent.into());
        }

        let board = &state.board;
        if board.is_occupied(first) || board.is_occupied(second) {
            return Err(WallRejection::Occupied.into());
        }
        if board.is_crossed(first) || board.is_crossed(second) {
            return Err(WallRejection::Crossing.into());
        }

        let scratch = board.with_wall(first, second);
        for player in Player::BOTH {
            if !scratch.has_path(state.position(player), player.goal_row(size)) {
                return Err(WallRejection::BlocksPath { player }.into());
            }
        }

        Ok(())
    }

    pub fn is_wall_placement_legal(
        state: &GameState,
        first: WallSegment,
        second: WallSegment,
    ) -> bool {
        Self::check_wall_placement(state, first, second).is_ok()
    }

    /// 当前行动方此刻能放的所有墙。
    pub fn legal_walls(state: &GameState) -> Vec<(WallSegment, WallSegment)> {
        if state.walls_left(state.current_player) == 0 {
            return Vec::new();
        }
        wall_slots(state.size())
            .iter()
            .copied()
            .filter(|(first, second)| Self::is_wall_placement_legal(state, *first, *second))
            .collect()
    }

    pub fn check_winner(state: &GameState) -> Option<Player> {
        state.check_winner()
    }

    pub fn attempt_move(
        &self,
        state: &mut GameState,
        target: Position,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_running(state)?;
        self.ensure_integrity(state)?;

        if !Self::compute_valid_moves(state).contains(&target) {
            debug!(player = %state.current_player, ?target, "move rejected");
            return Err(RuleError::IllegalMove { target });
        }

        let player = state.current_player;
        let from = state.position(player);
        state.positions[player.index()] = target;

        let mut events = Vec::new();
        let moved = GameEvent::PawnMoved {
            player,
            from,
            to: target,
        };
        state.record_event(moved.clone());
        events.push(moved);

        Self::finish_turn(state, &mut events);
        Ok(events)
    }

    pub fn attempt_wall_placement(
        &self,
        state: &mut GameState,
        first: WallSegment,
        second: WallSegment,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_running(state)?;
        self.ensure_integrity(state)?;

        if let Err(error) = Self::check_wall_placement(state, first, second) {
            debug!(player = %state.current_player, ?first, ?second, %error, "wall rejected");
            return Err(error);
        }

        let player = state.current_player;
        state.board.insert_wall(first, second);
        state.walls_remaining[player.index()] -= 1;

        let mut events = Vec::new();
        let placed = GameEvent::WallPlaced {
            player,
            first,
            second,
            walls_remaining: state.walls_left(player),
        };
        state.record_event(placed.clone());
        events.push(placed);

        Self::finish_turn(state, &mut events);
        Ok(events)
    }

    /// 移动模式进入放墙模式；任一放墙阶段退回移动模式。
    pub fn toggle_wall_mode(&self, state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_running(state)?;
        self.ensure_integrity(state)?;

        let player = state.current_player;
        match state.mode {
            InteractionMode::Move => {
                if state.walls_left(player) == 0 {
                    return Err(RuleError::NoWallsRemaining { player });
                }
                state.mode = InteractionMode::WallStage1;
            }
            InteractionMode::WallStage1 | InteractionMode::WallStage2 => {
                state.clear_wall_selection();
            }
        }
        debug!(%player, mode = %state.mode, "interaction mode changed");

        let event = GameEvent::WallModeChanged {
            player,
            mode: state.mode,
        };
        state.record_event(event.clone());
        Ok(vec![event])
    }

    pub fn cancel_wall_placement(
        &self,
        state: &mut GameState,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_running(state)?;
        if state.mode == InteractionMode::Move {
            return Ok(Vec::new());
        }

        state.clear_wall_selection();
        let event = GameEvent::WallSelectionCancelled {
            player: state.current_player,
            reason: None,
        };
        state.record_event(event.clone());
        Ok(vec![event])
    }

    /// 放墙阶段的点击。
    ///
    /// 第一次点击记录一个空闲墙段；第二次点击若能组成合法整墙则落墙并结束回合，
    /// 否则丢弃选择、回到移动模式，并通过带原因的 `WallSelectionCancelled` 报告。
    pub fn select_wall_segment(
        &self,
        state: &mut GameState,
        segment: WallSegment,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_running(state)?;
        self.ensure_integrity(state)?;

        let player = state.current_player;
        match (state.mode, state.first_wall_segment) {
            (InteractionMode::Move, _) => Err(RuleError::InvalidMode {
                expected: InteractionMode::WallStage1,
                actual: InteractionMode::Move,
            }),
            (InteractionMode::WallStage2, Some(first)) => {
                match self.attempt_wall_placement(state, first, segment) {
                    Ok(events) => Ok(events),
                    Err(error) => {
                        state.clear_wall_selection();
                        let event = GameEvent::WallSelectionCancelled {
                            player,
                            reason: Some(error),
                        };
                        state.record_event(event.clone());
                        Ok(vec![event])
                    }
                }
            }
            (InteractionMode::WallStage1, _) | (InteractionMode::WallStage2, None) => {
                if state.walls_left(player) == 0 {
                    return Err(RuleError::NoWallsRemaining { player });
                }
                if !segment.in_bounds(state.size()) {
                    return Err(WallRejection::OutOfBounds.into());
                }
                if state.board.is_occupied(segment) {
                    return Err(WallRejection::Occupied.into());
                }

                state.first_wall_segment = Some(segment);
                state.mode = InteractionMode::WallStage2;
                let event = GameEvent::WallSegmentSelected { player, segment };
                state.record_event(event.clone());
                Ok(vec![event])
            }
        }
    }

    fn finish_turn(state: &mut GameState, events: &mut Vec<GameEvent>) {
        let player = state.current_player;
        state.clear_wall_selection();

        if let Some(winner) = Self::check_winner(state) {
            state.winner = Some(winner);
            state.valid_moves.clear();
            info!(%winner, turn = state.turn, "game won");
            let won = GameEvent::GameWon { winner };
            state.record_event(won.clone());
            events.push(won);
            return;
        }

        let ended = GameEvent::TurnEnded {
            player,
            turn: state.turn,
        };
        state.record_event(ended.clone());
        events.push(ended);

        state.current_player = player.opponent();
        state.turn += 1;
        state.refresh_valid_moves();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::BOARD_SIZE;

    fn setup_state(p1: Position, p2: Position, current: Player) -> GameState {
        let mut state = GameState::default();
        state.positions = [p1, p2];
        state.current_player = current;
        state.refresh_valid_moves();
        state
    }

    fn sorted(mut moves: Vec<Position>) -> Vec<Position> {
        moves.sort();
        moves
    }

    #[test]
    fn opening_moves_exclude_the_back_edge() {
        let state = GameState::default();
        assert_eq!(
            sorted(RuleEngine::compute_valid_moves(&state)),
            vec![Position::new(7, 4), Position::new(8, 3), Position::new(8, 5)]
        );
    }

    #[test]
    fn straight_jump_over_adjacent_opponent() {
        let state = setup_state(Position::new(5, 4), Position::new(4, 4), Player::One);
        let moves = RuleEngine::compute_valid_moves(&state);
        assert!(moves.contains(&Position::new(3, 4)));
        assert!(!moves.contains(&Position::new(4, 4)));
        assert!(!moves.contains(&Position::new(4, 3)));
        assert_eq!(moves.len(), 4);
    }

    #[test]
    fn board_edge_behind_opponent_offers_diagonals() {
        let state = setup_state(Position::new(1, 4), Position::new(0, 4), Player::One);
        assert_eq!(
            sorted(RuleEngine::compute_valid_moves(&state)),
            vec![
                Position::new(0, 3),
                Position::new(0, 5),
                Position::new(1, 3),
                Position::new(1, 5),
                Position::new(2, 4),
            ]
        );
    }

    #[test]
    fn wall_behind_opponent_offers_only_open_diagonals() {
        let mut state = setup_state(Position::new(5, 4), Position::new(4, 4), Player::One);
        state
            .board
            .insert_wall(WallSegment::horizontal(3, 4), WallSegment::horizontal(3, 5));
        state
            .board
            .insert_wall(WallSegment::vertical(4, 4), WallSegment::vertical(5, 4));
        state.walls_remaining = [9, 9];
        assert!(state.integrity_check().is_ok());

        assert_eq!(
            sorted(RuleEngine::compute_valid_moves(&state)),
            vec![Position::new(4, 3), Position::new(5, 3), Position::new(6, 4)]
        );
    }

    #[test]
    fn moves_never_cross_walls_and_queries_are_stable() {
        let mut state = GameState::default();
        state
            .board
            .insert_wall(WallSegment::horizontal(7, 3), WallSegment::horizontal(7, 4));
        state.walls_remaining[1] -= 1;

        let first = RuleEngine::compute_valid_moves(&state);
        let second = RuleEngine::compute_valid_moves(&state);
        assert_eq!(first, second);
        assert!(!first.contains(&Position::new(7, 4)));
        assert!(!first.contains(&state.position(Player::Two)));
    }

    #[test]
    fn placing_a_wall_spends_it_and_passes_the_turn() {
        let engine = RuleEngine::new();
        let mut state = GameState::default();

        let events = engine
            .attempt_wall_placement(
                &mut state,
                WallSegment::horizontal(7, 3),
                WallSegment::horizontal(7, 4),
            )
            .expect("open wall should be legal");

        assert_eq!(state.walls_remaining, [9, 10]);
        assert_eq!(state.current_player, Player::Two);
        assert_eq!(state.turn, 2);
        assert!(state.board.is_edge_blocked(Position::new(8, 4), Position::new(7, 4)));
        assert!(matches!(
            events.as_slice(),
            [
                GameEvent::WallPlaced {
                    player: Player::One,
                    walls_remaining: 9,
                    ..
                },
                GameEvent::TurnEnded {
                    player: Player::One,
                    turn: 1
                }
            ]
        ));
        assert_eq!(state.valid_moves, RuleEngine::compute_valid_moves(&state));
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn overlapping_crossing_and_malformed_walls_are_rejected() {
        let engine = RuleEngine::new();
        let mut state = GameState::default();
        engine
            .attempt_wall_placement(
                &mut state,
                WallSegment::horizontal(4, 3),
                WallSegment::horizontal(4, 4),
            )
            .expect("first wall should be legal");
        let before = state.clone();

        let cases = [
            (
                WallSegment::horizontal(4, 4),
                WallSegment::horizontal(4, 5),
                WallRejection::Occupied,
            ),
            (
                WallSegment::vertical(4, 4),
                WallSegment::vertical(5, 4),
                WallRejection::Crossing,
            ),
            (
                WallSegment::vertical(3, 3),
                WallSegment::vertical(4, 3),
                WallRejection::Crossing,
            ),
            (
                WallSegment::horizontal(1, 1),
                WallSegment::horizontal(1, 3),
                WallRejection::NotAdjacent,
            ),
            (
                WallSegment::horizontal(1, 1),
                WallSegment::vertical(2, 1),
                WallRejection::NotAdjacent,
            ),
            (
                WallSegment::vertical(8, 1),
                WallSegment::vertical(7, 1),
                WallRejection::OutOfBounds,
            ),
            (
                WallSegment::horizontal(255, 0),
                WallSegment::horizontal(255, 1),
                WallRejection::OutOfBounds,
            ),
        ];

        for (first, second, reason) in cases {
            let result = engine.attempt_wall_placement(&mut state, first, second);
            assert_eq!(result, Err(RuleError::IllegalWall { reason }));
            assert_eq!(state, before, "rejected wall must not change the state");
        }
    }

    #[test]
    fn wall_sealing_player_two_behind_a_full_row_is_rejected() {
        let engine = RuleEngine::new();
        let mut state = GameState::default();
        // Seeded position: three horizontal pairs under row 0 plus a
        // vertical pair closing the gap beside column 8.
        state
            .board
            .insert_wall(WallSegment::horizontal(0, 0), WallSegment::horizontal(0, 1));
        state
            .board
            .insert_wall(WallSegment::horizontal(0, 2), WallSegment::horizontal(0, 3));
        state
            .board
            .insert_wall(WallSegment::horizontal(0, 6), WallSegment::horizontal(0, 7));
        state
            .board
            .insert_wall(WallSegment::vertical(0, 7), WallSegment::vertical(1, 7));
        let before = state.clone();

        let result = engine.attempt_wall_placement(
            &mut state,
            WallSegment::horizontal(0, 4),
            WallSegment::horizontal(0, 5),
        );

        assert_eq!(
            result,
            Err(RuleError::IllegalWall {
                reason: WallRejection::BlocksPath {
                    player: Player::Two
                }
            })
        );
        assert_eq!(state.walls_remaining, [10, 10]);
        assert_eq!(state, before);
    }

    #[test]
    fn wall_boxing_in_the_mover_is_rejected_too() {
        let mut state = setup_state(Position::new(4, 4), Position::new(0, 4), Player::Two);
        state
            .board
            .insert_wall(WallSegment::horizontal(3, 4), WallSegment::horizontal(3, 5));
        state
            .board
            .insert_wall(WallSegment::horizontal(4, 4), WallSegment::horizontal(4, 5));
        state
            .board
            .insert_wall(WallSegment::vertical(4, 4), WallSegment::vertical(5, 4));

        assert_eq!(
            RuleEngine::check_wall_placement(
                &state,
                WallSegment::vertical(4, 3),
                WallSegment::vertical(5, 3)
            ),
            Err(RuleError::IllegalWall {
                reason: WallRejection::BlocksPath {
                    player: Player::One
                }
            })
        );
        assert!(!RuleEngine::is_wall_placement_legal(
            &state,
            WallSegment::vertical(4, 3),
            WallSegment::vertical(5, 3)
        ));
    }

    #[test]
    fn no_walls_left_is_reported_before_geometry() {
        let engine = RuleEngine::new();
        let mut state = GameState::default();
        state.walls_remaining[0] = 0;
        let result = engine.attempt_wall_placement(
            &mut state,
            WallSegment::horizontal(2, 2),
            WallSegment::horizontal(2, 3),
        );
        assert_eq!(
            result,
            Err(RuleError::NoWallsRemaining {
                player: Player::One
            })
        );
        assert!(RuleEngine::legal_walls(&state).is_empty());
        assert_eq!(
            engine.toggle_wall_mode(&mut state),
            Err(RuleError::NoWallsRemaining {
                player: Player::One
            })
        );
    }

    #[test]
    fn illegal_move_is_rejected_without_change() {
        let engine = RuleEngine::new();
        let mut state = GameState::default();
        let before = state.clone();
        let result = engine.attempt_move(&mut state, Position::new(6, 4));
        assert_eq!(
            result,
            Err(RuleError::IllegalMove {
                target: Position::new(6, 4)
            })
        );
        assert_eq!(state, before);
    }

    #[test]
    fn reaching_the_goal_row_ends_the_game() {
        let engine = RuleEngine::new();
        let mut state = setup_state(Position::new(1, 4), Position::new(5, 0), Player::One);

        let events = engine
            .attempt_move(&mut state, Position::new(0, 4))
            .expect("step onto the goal row should be legal");

        assert_eq!(RuleEngine::check_winner(&state), Some(Player::One));
        assert_eq!(state.winner, Some(Player::One));
        assert!(state.valid_moves.is_empty());
        assert!(matches!(
            events.last(),
            Some(GameEvent::GameWon {
                winner: Player::One
            })
        ));

        let frozen = state.clone();
        assert_eq!(
            engine.attempt_move(&mut state, Position::new(0, 3)),
            Err(RuleError::GameAlreadyOver)
        );
        assert_eq!(
            engine.attempt_wall_placement(
                &mut state,
                WallSegment::horizontal(2, 2),
                WallSegment::horizontal(2, 3)
            ),
            Err(RuleError::GameAlreadyOver)
        );
        assert_eq!(engine.toggle_wall_mode(&mut state), Err(RuleError::GameAlreadyOver));
        assert_eq!(state, frozen);
    }

    #[test]
    fn two_click_wall_placement_commits_the_wall() {
        let engine = RuleEngine::new();
        let mut state = GameState::default();

        engine
            .toggle_wall_mode(&mut state)
            .expect("wall mode should open");
        assert_eq!(state.mode, InteractionMode::WallStage1);

        engine
            .select_wall_segment(&mut state, WallSegment::vertical(3, 3))
            .expect("first segment should be recorded");
        assert_eq!(state.mode, InteractionMode::WallStage2);
        assert_eq!(state.first_wall_segment, Some(WallSegment::vertical(3, 3)));

        assert_eq!(
            RuleEngine::adjacent_second_segments(&state, WallSegment::vertical(3, 3)),
            vec![WallSegment::vertical(2, 3), WallSegment::vertical(4, 3)]
        );

        let events = engine
            .select_wall_segment(&mut state, WallSegment::vertical(4, 3))
            .expect("second segment should complete the wall");
        assert!(matches!(events[0], GameEvent::WallPlaced { .. }));
        assert_eq!(state.mode, InteractionMode::Move);
        assert_eq!(state.first_wall_segment, None);
        assert_eq!(state.current_player, Player::Two);
        assert!(state.board.vertical().contains(3, 3));
        assert!(state.board.vertical().contains(4, 3));
    }

    #[test]
    fn non_adjacent_second_click_discards_the_selection() {
        let engine = RuleEngine::new();
        let mut state = GameState::default();
        engine
            .toggle_wall_mode(&mut state)
            .expect("wall mode should open");
        engine
            .select_wall_segment(&mut state, WallSegment::horizontal(2, 2))
            .expect("first segment should be recorded");

        let events = engine
            .select_wall_segment(&mut state, WallSegment::horizontal(5, 5))
            .expect("bad second click still resolves");

        assert!(matches!(
            events.as_slice(),
            [GameEvent::WallSelectionCancelled {
                player: Player::One,
                reason: Some(RuleError::IllegalWall {
                    reason: WallRejection::NotAdjacent
                })
            }]
        ));
        assert_eq!(state.mode, InteractionMode::Move);
        assert_eq!(state.first_wall_segment, None);
        assert_eq!(state.current_player, Player::One);
        assert_eq!(state.walls_remaining, [10, 10]);
        assert_eq!(state.board.segment_count(), 0);
    }

    #[test]
    fn segment_clicks_need_wall_mode_and_free_slots() {
        let engine = RuleEngine::new();
        let mut state = GameState::default();
        assert_eq!(
            engine.select_wall_segment(&mut state, WallSegment::horizontal(2, 2)),
            Err(RuleError::InvalidMode {
                expected: InteractionMode::WallStage1,
                actual: InteractionMode::Move
            })
        );

        engine
            .attempt_wall_placement(
                &mut state,
                WallSegment::horizontal(2, 2),
                WallSegment::horizontal(2, 3),
            )
            .expect("wall should be legal");
        engine
            .toggle_wall_mode(&mut state)
            .expect("player two can open wall mode");
        assert_eq!(
            engine.select_wall_segment(&mut state, WallSegment::horizontal(2, 3)),
            Err(RuleError::IllegalWall {
                reason: WallRejection::Occupied
            })
        );
        assert_eq!(state.mode, InteractionMode::WallStage1);

        engine
            .cancel_wall_placement(&mut state)
            .expect("cancel should succeed");
        assert_eq!(state.mode, InteractionMode::Move);
    }

    #[test]
    fn strict_engine_refuses_corrupted_states() {
        let mut state = GameState::default();
        state.positions[1] = Position::new(9, 9);
        let result = RuleEngine::strict().attempt_move(&mut state, Position::new(7, 4));
        assert!(matches!(
            result,
            Err(RuleError::IntegrityViolation {
                error: IntegrityError::PositionOutOfBounds { .. }
            })
        ));
    }

    #[test]
    fn new_game_validates_board_size() {
        assert_eq!(
            RuleEngine::new_game(2, 10),
            Err(RuleError::InvalidBoardSize { size: 2 })
        );
        let state = RuleEngine::new_game(BOARD_SIZE, 10).expect("standard board");
        assert_eq!(state, GameState::default());
        let small = RuleEngine::new_game(5, 3).expect("small board");
        assert_eq!(small.position(Player::One), Position::new(4, 2));
        assert_eq!(small.walls_remaining, [3, 3]);
    }
}
