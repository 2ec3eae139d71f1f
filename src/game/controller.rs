use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::board::{Position, WallSegment};
use super::rules::{RuleEngine, RuleError, RuleResolution};
use super::state::{GameEvent, GameState, InteractionMode, Player};
use crate::ai::{AiAgent, AiConfig, AiDecision, AiDifficulty};

/// 对局模式。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MatchMode {
    PlayerVsPlayer,
    PlayerVsComputer {
        ai_player: Player,
        difficulty: AiDifficulty,
    },
}

impl MatchMode {
    pub fn ai_player(&self) -> Option<Player> {
        match self {
            MatchMode::PlayerVsPlayer => None,
            MatchMode::PlayerVsComputer { ai_player, .. } => Some(*ai_player),
        }
    }
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::PlayerVsComputer {
            ai_player: Player::Two,
            difficulty: AiDifficulty::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingAiTurn {
    game_id: u64,
    turn: u32,
}

/// `begin_ai_turn` 的结果，交回 `commit_ai_decision` 时用来识别过期决策。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTurn {
    pub game_id: u64,
    pub decision: AiDecision,
}

/// 对局控制器：把点击路由到规则引擎，并管理电脑回合。
pub struct GameController {
    state: GameState,
    engine: RuleEngine,
    mode: MatchMode,
    agent: Option<AiAgent>,
    pending: Option<PendingAiTurn>,
    game_id: u64,
}

impl GameController {
    pub fn new(mode: MatchMode) -> Self {
        let agent = match mode {
            MatchMode::PlayerVsPlayer => None,
            MatchMode::PlayerVsComputer { difficulty, .. } => {
                Some(AiAgent::new(AiConfig::from_difficulty(difficulty)))
            }
        };
        Self::with_agent(mode, agent)
    }

    /// 使用指定的 AI（例如固定种子）创建控制器。
    pub fn with_agent(mode: MatchMode, agent: Option<AiAgent>) -> Self {
        Self {
            state: GameState::default(),
            engine: RuleEngine::new(),
            mode,
            agent,
            pending: None,
            game_id: 1,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn game_id(&self) -> u64 {
        self.game_id
    }

    pub fn has_pending_ai_turn(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_ai_turn(&self) -> bool {
        !self.state.is_finished() && self.mode.ai_player() == Some(self.state.current_player)
    }

    pub fn new_game(
        &mut self,
        board_size: u8,
        walls_per_player: u8,
    ) -> Result<RuleResolution, RuleError> {
        let state = RuleEngine::new_game(board_size, walls_per_player)?;
        let events = state.event_log.clone();
        self.replace_state(state);
        info!(game_id = self.game_id, mode = ?self.mode, "match reset");
        Ok(self.resolve(events))
    }

    /// 载入外部状态，先做完整性校验，再重算可走格缓存。
    pub fn load_state(&mut self, mut state: GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })?;
        state.refresh_valid_moves();
        self.replace_state(state);
        info!(game_id = self.game_id, turn = self.state.turn, "state loaded");
        Ok(())
    }

    fn replace_state(&mut self, state: GameState) {
        self.state = state;
        self.pending = None;
        self.game_id += 1;
        if let Some(agent) = self.agent.as_mut() {
            agent.reset_memory();
        }
    }

    fn ensure_human_turn(&self) -> Result<(), RuleError> {
        if self.pending.is_some() {
            return Err(RuleError::AiTurnPending);
        }
        if self.is_ai_turn() {
            return Err(RuleError::NotPlayerTurn {
                player: self.state.current_player.opponent(),
            });
        }
        Ok(())
    }

    pub fn click_cell(&mut self, target: Position) -> Result<RuleResolution, RuleError> {
        self.ensure_human_turn()?;
        if self.state.mode != InteractionMode::Move && !self.state.is_finished() {
            return Err(RuleError::InvalidMode {
                expected: InteractionMode::Move,
                actual: self.state.mode,
            });
        }
        let events = self.engine.attempt_move(&mut self.state, target)?;
        Ok(self.resolve(events))
    }

    pub fn toggle_wall_mode(&mut self) -> Result<RuleResolution, RuleError> {
        self.ensure_human_turn()?;
        let events = self.engine.toggle_wall_mode(&mut self.state)?;
        Ok(self.resolve(events))
    }

    pub fn click_wall(&mut self, segment: WallSegment) -> Result<RuleResolution, RuleError> {
        self.ensure_human_turn()?;
        let events = self.engine.select_wall_segment(&mut self.state, segment)?;
        Ok(self.resolve(events))
    }

    pub fn cancel_wall(&mut self) -> Result<RuleResolution, RuleError> {
        self.ensure_human_turn()?;
        let events = self.engine.cancel_wall_placement(&mut self.state)?;
        Ok(self.resolve(events))
    }

    /// 第一阶段：立即算出电脑的决策并锁定本回合，等待 `commit_ai_decision`。
    pub fn begin_ai_turn(&mut self) -> Result<AiTurn, RuleError> {
        if self.state.is_finished() {
            return Err(RuleError::GameAlreadyOver);
        }
        if self.pending.is_some() {
            return Err(RuleError::AiTurnPending);
        }
        let ai_player = self
            .mode
            .ai_player()
            .unwrap_or_else(|| self.state.current_player.opponent());
        if ai_player != self.state.current_player {
            return Err(RuleError::NotPlayerTurn { player: ai_player });
        }
        let agent = self
            .agent
            .as_mut()
            .ok_or(RuleError::NotPlayerTurn { player: ai_player })?;

        let decision = agent.decide_action(&self.state);
        if decision.action.is_none() {
            debug!(game_id = self.game_id, turn = decision.turn, "ai has no legal action");
            return Err(RuleError::NoLegalAction { player: ai_player });
        }
        self.pending = Some(PendingAiTurn {
            game_id: self.game_id,
            turn: decision.turn,
        });
        debug!(game_id = self.game_id, turn = decision.turn, reason = ?decision.reason, "ai turn started");

        Ok(AiTurn {
            game_id: self.game_id,
            decision,
        })
    }

    /// 第二阶段：应用决策。对局重置或回合已变化时拒绝；
    /// 没有动作的决策报 `NoLegalAction`，待定回合保留。
    pub fn commit_ai_decision(&mut self, ai_turn: &AiTurn) -> Result<RuleResolution, RuleError> {
        let expected = PendingAiTurn {
            game_id: ai_turn.game_id,
            turn: ai_turn.decision.turn,
        };
        if self.pending != Some(expected) || self.state.turn != expected.turn {
            debug!(
                game_id = ai_turn.game_id,
                turn = ai_turn.decision.turn,
                "stale ai decision dropped"
            );
            return Err(RuleError::StaleAiDecision);
        }
        let action = ai_turn.decision.action.ok_or(RuleError::NoLegalAction {
            player: ai_turn.decision.player,
        })?;
        self.pending = None;

        let events = action.apply(&self.engine, &mut self.state)?;
        Ok(self.resolve(events))
    }

    /// 不需要思考延迟时一次走完两个阶段。
    pub fn play_ai_turn(&mut self) -> Result<RuleResolution, RuleError> {
        let ai_turn = self.begin_ai_turn()?;
        self.commit_ai_decision(&ai_turn)
    }

    fn resolve(&self, events: Vec<GameEvent>) -> RuleResolution {
        RuleResolution::new(self.state.clone(), events)
    }
}

impl Default for GameController {
    fn default() -> Self {
        GameController::new(MatchMode::default())
    }
}
