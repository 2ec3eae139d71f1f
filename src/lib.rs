pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{
    AiAgent, AiConfig, AiDecision, AiDifficulty, AiMemory, DecisionReason, GameAction,
};
pub use game::{
    AiTurn, BoardGraph, GameController, GameEvent, GameState, IntegrityError, InteractionMode,
    MatchMode, Player, Position, RuleEngine, RuleError, RuleResolution, WallOrientation,
    WallRejection, WallSegment, BOARD_SIZE, WALLS_PER_PLAYER,
};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    utils::console_log(concat!("quoridor_core ", env!("CARGO_PKG_VERSION"), " loaded"));
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(resolution: &RuleResolution) -> Result<String, JsValue> {
    serde_json::to_string(resolution).map_err(serde_to_js_error)
}

/// 外部传入的状态先做完整性校验。
fn checked_state(state: GameState) -> Result<GameState, RuleError> {
    state
        .integrity_check()
        .map_err(|error| RuleError::IntegrityViolation { error })?;
    Ok(state)
}

fn state_from_js(value: JsValue) -> Result<GameState, JsValue> {
    let state: GameState = from_value(value).map_err(JsValue::from)?;
    checked_state(state).map_err(to_js_error)
}

fn parse_difficulty(difficulty: Option<String>) -> AiDifficulty {
    difficulty
        .as_deref()
        .and_then(|value| AiDifficulty::from_str(value).ok())
        .unwrap_or_default()
}

/// 供前端使用的对局引擎，所有数据以 JSON 字符串进出。
#[wasm_bindgen]
pub struct QuoridorEngine {
    controller: GameController,
}

#[wasm_bindgen]
impl QuoridorEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(mode_json: Option<String>) -> Result<QuoridorEngine, JsValue> {
        let mode = match mode_json {
            Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error)?,
            None => MatchMode::default(),
        };
        Ok(QuoridorEngine {
            controller: GameController::new(mode),
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.controller.state()).map_err(serde_to_js_error)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        let state: GameState = serde_json::from_str(json).map_err(serde_to_js_error)?;
        self.controller.load_state(state).map_err(to_js_error)
    }

    pub fn new_game(
        &mut self,
        board_size: Option<u8>,
        walls_per_player: Option<u8>,
    ) -> Result<String, JsValue> {
        let resolution = self
            .controller
            .new_game(
                board_size.unwrap_or(BOARD_SIZE),
                walls_per_player.unwrap_or(WALLS_PER_PLAYER),
            )
            .map_err(to_js_error)?;
        make_resolution_json(&resolution)
    }

    pub fn valid_moves_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.controller.state().valid_moves).map_err(serde_to_js_error)
    }

    pub fn is_ai_turn(&self) -> bool {
        self.controller.is_ai_turn()
    }

    pub fn click_cell(&mut self, row: u8, col: u8) -> Result<String, JsValue> {
        let resolution = self
            .controller
            .click_cell(Position::new(row, col))
            .map_err(to_js_error)?;
        make_resolution_json(&resolution)
    }

    pub fn toggle_wall_mode(&mut self) -> Result<String, JsValue> {
        let resolution = self.controller.toggle_wall_mode().map_err(to_js_error)?;
        make_resolution_json(&resolution)
    }

    pub fn click_wall(&mut self, segment_json: &str) -> Result<String, JsValue> {
        let segment: WallSegment =
            serde_json::from_str(segment_json).map_err(serde_to_js_error)?;
        let resolution = self.controller.click_wall(segment).map_err(to_js_error)?;
        make_resolution_json(&resolution)
    }

    pub fn cancel_wall(&mut self) -> Result<String, JsValue> {
        let resolution = self.controller.cancel_wall().map_err(to_js_error)?;
        make_resolution_json(&resolution)
    }

    pub fn begin_ai_turn(&mut self) -> Result<String, JsValue> {
        let ai_turn = self.controller.begin_ai_turn().map_err(to_js_error)?;
        serde_json::to_string(&ai_turn).map_err(serde_to_js_error)
    }

    pub fn commit_ai_decision(&mut self, ai_turn_json: &str) -> Result<String, JsValue> {
        let ai_turn: AiTurn = serde_json::from_str(ai_turn_json).map_err(serde_to_js_error)?;
        let resolution = self
            .controller
            .commit_ai_decision(&ai_turn)
            .map_err(to_js_error)?;
        make_resolution_json(&resolution)
    }

    pub fn play_ai_turn(&mut self) -> Result<String, JsValue> {
        let resolution = self.controller.play_ai_turn().map_err(to_js_error)?;
        make_resolution_json(&resolution)
    }

    /// 立即算出决策并锁定回合，Promise 在展示用的延迟之后才交出结果，
    /// 前端随后调用 `commit_ai_decision`。
    pub fn think_ai(&mut self, delay_ms: Option<u32>) -> Promise {
        let ai_turn = self.controller.begin_ai_turn();
        let delay = delay_ms.unwrap_or(0);

        future_to_promise(async move {
            let ai_turn = ai_turn.map_err(to_js_error)?;
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let json = serde_json::to_string(&ai_turn).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }
}

/// 创建一局新游戏，默认 9x9 棋盘、每人 10 块墙。
#[wasm_bindgen(js_name = "newGame")]
pub fn new_game(board_size: Option<u8>, walls_per_player: Option<u8>) -> Result<JsValue, JsValue> {
    let state = RuleEngine::new_game(
        board_size.unwrap_or(BOARD_SIZE),
        walls_per_player.unwrap_or(WALLS_PER_PLAYER),
    )
    .map_err(to_js_error)?;
    to_value(&state).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "computeValidMoves")]
pub fn compute_valid_moves(state: JsValue) -> Result<JsValue, JsValue> {
    let state = state_from_js(state)?;
    to_value(&RuleEngine::compute_valid_moves(&state)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "attemptMove")]
pub fn attempt_move(state: JsValue, target: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let target: Position = from_value(target).map_err(JsValue::from)?;
    match RuleEngine::strict().attempt_move(&mut state, target) {
        Ok(events) => to_value(&RuleResolution::new(state, events)).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "attemptWallPlacement")]
pub fn attempt_wall_placement(
    state: JsValue,
    first: JsValue,
    second: JsValue,
) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let first: WallSegment = from_value(first).map_err(JsValue::from)?;
    let second: WallSegment = from_value(second).map_err(JsValue::from)?;
    match RuleEngine::strict().attempt_wall_placement(&mut state, first, second) {
        Ok(events) => to_value(&RuleResolution::new(state, events)).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

/// 与第一段墙共线且相邻、能组成整墙的第二段候选。
#[wasm_bindgen(js_name = "adjacentSecondSegments")]
pub fn adjacent_second_segments(
    segment: JsValue,
    board_size: Option<u8>,
) -> Result<JsValue, JsValue> {
    let segment: WallSegment = from_value(segment).map_err(JsValue::from)?;
    let size = board_size.unwrap_or(BOARD_SIZE);
    to_value(&segment.adjacent_second_segments(size)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "legalWalls")]
pub fn legal_walls(state: JsValue) -> Result<JsValue, JsValue> {
    let state = state_from_js(state)?;
    to_value(&RuleEngine::legal_walls(&state)).map_err(JsValue::from)
}

/// 返回获胜玩家编号（1 或 2），无人获胜时返回 undefined。
#[wasm_bindgen(js_name = "checkWinner")]
pub fn check_winner(state: JsValue) -> Result<Option<u8>, JsValue> {
    let state = state_from_js(state)?;
    Ok(RuleEngine::check_winner(&state).map(Player::number))
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    state_from_js(state).map(|_| ())
}

#[derive(Serialize)]
struct AiMove {
    decision: AiDecision,
    memory: AiMemory,
}

/// 为当前行动方计算一步 AI 决策，不修改传入的状态。
/// `memory` 传入上一次返回的记忆（可省略），结果中带回更新后的记忆。
#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(
    state: JsValue,
    difficulty: Option<String>,
    seed: Option<u32>,
    memory: JsValue,
) -> Result<JsValue, JsValue> {
    let state = state_from_js(state)?;
    let memory: AiMemory = if memory.is_undefined() || memory.is_null() {
        AiMemory::new()
    } else {
        from_value(memory).map_err(JsValue::from)?
    };
    to_value(&select_action(&state, parse_difficulty(difficulty), seed, memory))
        .map_err(JsValue::from)
}

fn select_action(
    state: &GameState,
    difficulty: AiDifficulty,
    seed: Option<u32>,
    memory: AiMemory,
) -> AiMove {
    let config = AiConfig::from_difficulty(difficulty);
    let agent = match seed {
        Some(seed) => AiAgent::with_seed(config, u64::from(seed)),
        None => AiAgent::new(config),
    };
    let mut agent = agent.with_memory(memory);
    let decision = agent.decide_action(state);
    AiMove {
        decision,
        memory: agent.into_memory(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_falls_back_to_medium() {
        assert_eq!(parse_difficulty(None), AiDifficulty::Medium);
        assert_eq!(parse_difficulty(Some("Hard".into())), AiDifficulty::Hard);
        assert_eq!(parse_difficulty(Some("grandmaster".into())), AiDifficulty::Medium);
    }

    #[test]
    fn external_states_must_pass_integrity() {
        let mut state = GameState::default();
        state.positions[0] = Position::new(20, 0);
        assert!(matches!(
            checked_state(state),
            Err(RuleError::IntegrityViolation {
                error: IntegrityError::PositionOutOfBounds { .. }
            })
        ));

        let mut state = GameState::default();
        state
            .board
            .insert_wall(WallSegment::horizontal(255, 0), WallSegment::horizontal(255, 1));
        state.walls_remaining[0] = 9;
        assert!(matches!(
            checked_state(state),
            Err(RuleError::IntegrityViolation {
                error: IntegrityError::SegmentOutOfBounds { .. }
            })
        ));

        assert!(checked_state(GameState::default()).is_ok());
    }

    #[test]
    fn ai_memory_threads_through_stateless_calls() {
        let mut state = GameState::default();
        let mut memory = AiMemory::new();
        for turn in 0..2 {
            let ai_move = select_action(&state, AiDifficulty::Medium, Some(3), memory);
            assert_eq!(ai_move.decision.player, Player::One);
            assert_eq!(ai_move.memory.recent().count(), turn + 1);
            memory = ai_move.memory;

            let action = ai_move.decision.action.expect("opening has moves");
            action
                .apply(&RuleEngine::new(), &mut state)
                .expect("ai action is legal");
            let reply = state.valid_moves[0];
            RuleEngine::new()
                .attempt_move(&mut state, reply)
                .expect("player two replies");
        }
    }

    #[test]
    fn resolutions_serialize_with_winner() {
        let mut state = GameState::default();
        state.positions[0] = Position::new(1, 0);
        state.refresh_valid_moves();
        let events = RuleEngine::new()
            .attempt_move(&mut state, Position::new(0, 0))
            .expect("winning step should be legal");

        let json = make_resolution_json(&RuleResolution::new(state, events))
            .expect("resolution should serialize");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["winner"], 1);
        assert_eq!(value["events"][1]["type"], "GameWon");
    }
}
