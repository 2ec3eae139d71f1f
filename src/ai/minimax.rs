use std::cmp::Ordering;
use std::str::FromStr;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::memory::AiMemory;
use crate::game::{
    wall_center, wall_slots, GameEvent, GameState, Player, Position, RuleEngine, RuleError,
    RuleResolution, WallOrientation, WallSegment,
};
use crate::utils::WasmInstant;

const WIN_SCORE: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameAction {
    Move {
        to: Position,
    },
    PlaceWall {
        first: WallSegment,
        second: WallSegment,
    },
}

impl GameAction {
    /// 通过规则引擎执行动作，与玩家输入走同一条校验路径。
    pub fn apply(
        &self,
        engine: &RuleEngine,
        state: &mut GameState,
    ) -> Result<Vec<GameEvent>, RuleError> {
        match *self {
            GameAction::Move { to } => engine.attempt_move(state, to),
            GameAction::PlaceWall { first, second } => {
                engine.attempt_wall_placement(state, first, second)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "medium" | "normal" => Ok(AiDifficulty::Medium),
            "hard" => Ok(AiDifficulty::Hard),
            _ => Err(()),
        }
    }
}

/// 决策来自哪一步。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    ImmediateWin,
    Random,
    CriticalBlock,
    Block,
    StrategicWall,
    BestScore,
    Fallback,
    NoAction,
}

/// 何时放墙拦截对手。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlockPolicy {
    /// 对手离终点行不超过这么多行就拦。
    pub row_threshold: u8,
    /// 对手路径不长于自己时就拦。
    pub when_level: bool,
    /// 对手路径不超过此值且领先时就拦。
    pub distance_threshold: u32,
    pub min_gain: i32,
    pub max_self_delay: u32,
    /// 优先选择能让即将获胜的对手多走两步以上的墙。
    pub critical: bool,
}

impl BlockPolicy {
    fn triggers(&self, opponent_rows: u8, opponent_distance: u32, own_distance: u32) -> bool {
        opponent_rows <= self.row_threshold
            || (self.when_level && opponent_distance <= own_distance)
            || (opponent_distance <= self.distance_threshold && opponent_distance < own_distance)
    }
}

/// 领先时主动放墙。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrategicWallPolicy {
    pub min_walls: u8,
    pub min_score: f64,
    pub opponent_delay_weight: f64,
    pub own_delay_weight: f64,
}

/// 搜索时考虑哪些墙。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum WallFilter {
    All,
    Nearby { radius: u8, limit: usize },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvalWeights {
    pub path: f64,
    pub progress: f64,
    pub centre: f64,
    pub mobility: f64,
    pub walls_in_hand: f64,
    pub edge: f64,
    pub corridor: f64,
    pub chokepoint: f64,
    pub detour: f64,
    pub repetition: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    pub random_action_rate: f64,
    pub random_wall_rate: f64,
    pub forward_bias: f64,
    pub immediate_win: bool,
    pub block: Option<BlockPolicy>,
    pub strategic_wall: Option<StrategicWallPolicy>,
    pub depth: u8,
    pub score_walls: bool,
    pub wall_filter: WallFilter,
    pub weights: EvalWeights,
    pub near_top_margin: f64,
    pub time_limit: Duration,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        let standard = EvalWeights {
            path: 100.0,
            progress: 30.0,
            centre: 3.0,
            mobility: 8.0,
            walls_in_hand: 0.0,
            edge: 12.0,
            corridor: 25.0,
            chokepoint: 20.0,
            detour: 35.0,
            repetition: 40.0,
        };

        match difficulty {
            AiDifficulty::Easy => Self {
                difficulty,
                random_action_rate: 1.0,
                random_wall_rate: 0.2,
                forward_bias: 0.25,
                immediate_win: false,
                block: None,
                strategic_wall: None,
                depth: 1,
                score_walls: false,
                wall_filter: WallFilter::All,
                weights: standard,
                near_top_margin: 0.0,
                time_limit: Duration::from_millis(50),
            },
            AiDifficulty::Medium => Self {
                difficulty,
                random_action_rate: 0.0,
                random_wall_rate: 0.0,
                forward_bias: 0.0,
                immediate_win: true,
                block: Some(BlockPolicy {
                    row_threshold: 3,
                    when_level: true,
                    distance_threshold: 0,
                    min_gain: 1,
                    max_self_delay: 2,
                    critical: false,
                }),
                strategic_wall: Some(StrategicWallPolicy {
                    min_walls: 3,
                    min_score: 15.0,
                    opponent_delay_weight: 40.0,
                    own_delay_weight: 30.0,
                }),
                depth: 1,
                score_walls: false,
                wall_filter: WallFilter::All,
                weights: standard,
                near_top_margin: 0.0,
                time_limit: Duration::from_millis(120),
            },
            AiDifficulty::Hard => Self {
                difficulty,
                random_action_rate: 0.0,
                random_wall_rate: 0.0,
                forward_bias: 0.0,
                immediate_win: true,
                block: Some(BlockPolicy {
                    row_threshold: 1,
                    when_level: false,
                    distance_threshold: 2,
                    min_gain: 1,
                    max_self_delay: 1,
                    critical: true,
                }),
                strategic_wall: None,
                depth: 2,
                score_walls: true,
                wall_filter: WallFilter::Nearby {
                    radius: 4,
                    limit: 20,
                },
                weights: EvalWeights {
                    path: 150.0,
                    walls_in_hand: 12.0,
                    corridor: 20.0,
                    chokepoint: 15.0,
                    detour: 25.0,
                    ..standard
                },
                near_top_margin: 4.0,
                time_limit: Duration::from_millis(250),
            },
        }
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::Medium)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<GameAction>,
    pub reason: DecisionReason,
    pub evaluation: f64,
    pub depth_reached: u8,
    pub nodes: u64,
    pub timed_out: bool,
    pub duration_ms: u64,
    pub turn: u32,
    pub player: Player,
    pub difficulty: AiDifficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<RuleResolution>,
}

struct SearchStats {
    nodes: u64,
    depth_reached: u8,
    timed_out: bool,
}

impl SearchStats {
    fn new() -> Self {
        Self {
            nodes: 0,
            depth_reached: 0,
            timed_out: false,
        }
    }
}

type Choice = (Option<GameAction>, DecisionReason, f64);

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
    memory: AiMemory,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
            memory: AiMemory::new(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
            memory: AiMemory::new(),
        }
    }

    /// 接续外部保存的记忆，供无状态调用方跨回合使用。
    pub fn with_memory(mut self, memory: AiMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn into_memory(self) -> AiMemory {
        self.memory
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn memory(&self) -> &AiMemory {
        &self.memory
    }

    pub fn reset_memory(&mut self) {
        self.memory.clear();
    }

    /// 为当前行动方挑选一个动作。传入的状态不会被修改，
    /// 只有 AI 自己的近期位置记忆会更新。
    pub fn decide_action(&mut self, state: &GameState) -> AiDecision {
        let start = WasmInstant::now();
        let deadline = if self.config.time_limit.is_zero() {
            None
        } else {
            Some(start + self.config.time_limit)
        };
        let mut stats = SearchStats::new();

        if state.is_finished() {
            let evaluation = self.evaluate(state, state.current_player);
            return self.conclude(
                state,
                (None, DecisionReason::NoAction, evaluation),
                &mut stats,
                start,
            );
        }

        let mut snapshot = state.clone();
        snapshot.event_log.clear();
        self.memory.record(snapshot.active_position());

        let choice = self.choose(&snapshot, deadline, &mut stats);
        self.conclude(&snapshot, choice, &mut stats, start)
    }

    fn choose(
        &mut self,
        state: &GameState,
        deadline: Option<WasmInstant>,
        stats: &mut SearchStats,
    ) -> Choice {
        let me = state.current_player;
        let opponent = me.opponent();
        let size = state.size();
        let moves = RuleEngine::compute_valid_moves(state);

        if self.config.random_action_rate > 0.0
            && self
                .rng
                .gen_bool(self.config.random_action_rate.clamp(0.0, 1.0))
        {
            if let Some(action) = self.random_action(state, &moves) {
                stats.nodes += 1;
                let evaluation = self.evaluate_action(state, &action);
                return (Some(action), DecisionReason::Random, evaluation);
            }
        }

        if self.config.immediate_win {
            let goal = me.goal_row(size);
            if let Some(&to) = moves.iter().find(|target| target.row == goal) {
                stats.nodes += 1;
                return (
                    Some(GameAction::Move { to }),
                    DecisionReason::ImmediateWin,
                    WIN_SCORE,
                );
            }
        }

        if let (Some(own), Some(theirs)) = (state.goal_distance(me), state.goal_distance(opponent))
        {
            if let Some(policy) = self.config.block {
                let opponent_rows =
                    opponent.rows_to_goal(state.position(opponent).row, size);
                if policy.triggers(opponent_rows, theirs, own) {
                    if let Some(choice) = self.find_blocking_wall(state, policy, own, theirs, stats)
                    {
                        return choice;
                    }
                }
            }

            if let Some(policy) = self.config.strategic_wall {
                if own < theirs && state.walls_left(me) >= policy.min_walls {
                    if let Some((action, score)) =
                        self.find_strategic_wall(state, policy, own, theirs, stats)
                    {
                        return (Some(action), DecisionReason::StrategicWall, score);
                    }
                }
            }
        }

        if let Some((action, score)) = self.search(state, deadline, stats) {
            return (Some(action), DecisionReason::BestScore, score);
        }

        match fallback_action(state, &moves) {
            Some(action) => {
                let evaluation = self.evaluate_action(state, &action);
                (Some(action), DecisionReason::Fallback, evaluation)
            }
            None => (None, DecisionReason::NoAction, self.evaluate(state, me)),
        }
    }

    fn conclude(
        &mut self,
        state: &GameState,
        (action, reason, evaluation): Choice,
        stats: &mut SearchStats,
        start: WasmInstant,
    ) -> AiDecision {
        if action.is_some() {
            stats.depth_reached = stats.depth_reached.max(1);
        }
        let resolution = action
            .as_ref()
            .and_then(|action| self.simulate_resolution(state, action).ok());

        debug!(
            player = %state.current_player,
            ?action,
            ?reason,
            evaluation,
            nodes = stats.nodes,
            "ai decision"
        );

        AiDecision {
            action,
            reason,
            evaluation,
            depth_reached: stats.depth_reached,
            nodes: stats.nodes,
            timed_out: stats.timed_out,
            duration_ms: start.elapsed().as_millis() as u64,
            turn: state.turn,
            player: state.current_player,
            difficulty: self.config.difficulty,
            resolution,
        }
    }

    fn random_action(&mut self, state: &GameState, moves: &[Position]) -> Option<GameAction> {
        let me = state.current_player;
        if state.walls_left(me) > 0
            && self
                .rng
                .gen_bool(self.config.random_wall_rate.clamp(0.0, 1.0))
        {
            let walls = RuleEngine::legal_walls(state);
            if let Some(&(first, second)) = walls.choose(&mut self.rng) {
                return Some(GameAction::PlaceWall { first, second });
            }
        }

        if moves.is_empty() {
            return None;
        }

        if self.config.forward_bias > 0.0
            && self.rng.gen_bool(self.config.forward_bias.clamp(0.0, 1.0))
        {
            let goal = me.goal_row(state.size());
            let current = state.goal_distance(me);
            let forward: Vec<Position> = moves
                .iter()
                .copied()
                .filter(|target| {
                    matches!(
                        (state.board.shortest_distance(*target, goal), current),
                        (Some(next), Some(now)) if next < now
                    )
                })
                .collect();
            if let Some(&to) = forward.choose(&mut self.rng) {
                return Some(GameAction::Move { to });
            }
        }

        moves.choose(&mut self.rng).map(|&to| GameAction::Move { to })
    }

    fn find_blocking_wall(
        &mut self,
        state: &GameState,
        policy: BlockPolicy,
        own: u32,
        theirs: u32,
        stats: &mut SearchStats,
    ) -> Option<Choice> {
        let opponent = state.current_player.opponent();
        let opponent_rows = opponent.rows_to_goal(state.position(opponent).row, state.size());

        let mut best: Option<(GameAction, i32)> = None;
        let mut critical: Option<(GameAction, u32)> = None;

        for (first, second) in RuleEngine::legal_walls(state) {
            stats.nodes += 1;
            let Some((own_after, theirs_after)) = distances_after(state, first, second) else {
                continue;
            };
            let own_delay = own_after.saturating_sub(own);
            let their_delay = theirs_after.saturating_sub(theirs);
            let action = GameAction::PlaceWall { first, second };

            if policy.critical
                && opponent_rows <= 2
                && theirs_after > 2
                && critical.map_or(true, |(_, delay)| their_delay > delay)
            {
                critical = Some((action, their_delay));
            }

            let gain = their_delay as i32 - own_delay as i32;
            if gain >= policy.min_gain
                && own_delay <= policy.max_self_delay
                && best.map_or(true, |(_, best_gain)| gain > best_gain)
            {
                best = Some((action, gain));
            }
        }

        let path = self.config.weights.path;
        if let Some((action, delay)) = critical {
            return Some((
                Some(action),
                DecisionReason::CriticalBlock,
                f64::from(delay) * path,
            ));
        }
        best.map(|(action, gain)| (Some(action), DecisionReason::Block, f64::from(gain) * path))
    }

    fn find_strategic_wall(
        &mut self,
        state: &GameState,
        policy: StrategicWallPolicy,
        own: u32,
        theirs: u32,
        stats: &mut SearchStats,
    ) -> Option<(GameAction, f64)> {
        let size = state.size();
        let target = state.position(state.current_player.opponent());
        let mut best: Option<(GameAction, f64)> = None;

        for (first, second) in RuleEngine::legal_walls(state) {
            stats.nodes += 1;
            let Some((own_after, theirs_after)) = distances_after(state, first, second) else {
                continue;
            };
            let their_delay = theirs_after.saturating_sub(theirs);
            let own_delay = own_after.saturating_sub(own);
            let proximity = distance_to(wall_center(first, second), target);

            let score = f64::from(their_delay) * policy.opponent_delay_weight
                - f64::from(own_delay) * policy.own_delay_weight
                + (10.0 - proximity * 2.0).max(0.0)
                + self.wall_shape_bonus(size, first, second, their_delay);

            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((GameAction::PlaceWall { first, second }, score));
            }
        }

        best.filter(|(_, score)| *score > policy.min_score)
    }

    /// 根节点搜索。候选按“移动（上下左右）→ 墙”的顺序评估，
    /// 同分取先出现者；开启 near_top_margin 时在接近最高分的候选中随机挑选。
    fn search(
        &mut self,
        state: &GameState,
        deadline: Option<WasmInstant>,
        stats: &mut SearchStats,
    ) -> Option<(GameAction, f64)> {
        let me = state.current_player;
        let transitions = self.generate_transitions(state, deadline);
        if transitions.is_empty() {
            return None;
        }

        let depth = self.config.depth.saturating_sub(1);
        let margin = self.config.near_top_margin;
        trace!(candidates = transitions.len(), depth = self.config.depth, "root search");
        let mut alpha = f64::NEG_INFINITY;
        let mut scored: Vec<(GameAction, f64)> = Vec::with_capacity(transitions.len());
        let mut best: Option<(usize, f64)> = None;

        for (action, child_state) in transitions {
            let bonus = self.action_bonus(state, &action, &child_state);
            let window = if margin > 0.0 { alpha - margin } else { alpha };
            let score = self.minimax_rec(
                &child_state,
                depth,
                window - bonus,
                f64::INFINITY,
                me,
                deadline,
                stats,
            ) + bonus;

            if stats.timed_out {
                break;
            }

            alpha = alpha.max(score);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((scored.len(), score));
            }
            scored.push((action, score));
        }

        trace!(scored = scored.len(), nodes = stats.nodes, timed_out = stats.timed_out, "root search done");
        let (best_index, _) = best?;
        let pick = self.pick_near_top(&scored, best_index);
        Some(scored[pick])
    }

    /// 在与最高分相差不到 near_top_margin 的候选中随机挑一个；边距为零时就是最高分。
    fn pick_near_top(&mut self, scored: &[(GameAction, f64)], best_index: usize) -> usize {
        let margin = self.config.near_top_margin;
        if margin <= 0.0 {
            return best_index;
        }
        let best_score = scored[best_index].1;
        let pool: Vec<usize> = scored
            .iter()
            .enumerate()
            .filter(|(index, (_, score))| *index == best_index || *score > best_score - margin)
            .map(|(index, _)| index)
            .collect();
        pool.choose(&mut self.rng).copied().unwrap_or(best_index)
    }

    fn minimax_rec(
        &mut self,
        state: &GameState,
        depth_remaining: u8,
        mut alpha: f64,
        mut beta: f64,
        root_player: Player,
        deadline: Option<WasmInstant>,
        stats: &mut SearchStats,
    ) -> f64 {
        stats.nodes += 1;
        let depth_explored = self.config.depth.saturating_sub(depth_remaining);
        if depth_explored > stats.depth_reached {
            stats.depth_reached = depth_explored;
        }

        if let Some(deadline) = deadline {
            if WasmInstant::now() >= deadline {
                stats.timed_out = true;
                return self.evaluate(state, root_player);
            }
        }

        if depth_remaining == 0 || state.is_finished() {
            return self.evaluate(state, root_player);
        }

        let maximizing_player = state.current_player == root_player;
        let transitions = self.generate_transitions(state, deadline);
        if transitions.is_empty() {
            return self.evaluate(state, root_player);
        }

        if maximizing_player {
            let mut value = f64::NEG_INFINITY;
            for (_, child_state) in transitions {
                let score = self.minimax_rec(
                    &child_state,
                    depth_remaining.saturating_sub(1),
                    alpha,
                    beta,
                    root_player,
                    deadline,
                    stats,
                );
                value = value.max(score);
                alpha = alpha.max(value);
                if stats.timed_out || beta <= alpha {
                    break;
                }
            }
            value
        } else {
            let mut value = f64::INFINITY;
            for (_, child_state) in transitions {
                let score = self.minimax_rec(
                    &child_state,
                    depth_remaining.saturating_sub(1),
                    alpha,
                    beta,
                    root_player,
                    deadline,
                    stats,
                );
                value = value.min(score);
                beta = beta.min(value);
                if stats.timed_out || beta <= alpha {
                    break;
                }
            }
            value
        }
    }

    fn generate_transitions(
        &self,
        state: &GameState,
        deadline: Option<WasmInstant>,
    ) -> Vec<(GameAction, GameState)> {
        let mut transitions = Vec::new();
        let expired = |deadline: Option<WasmInstant>| {
            deadline.is_some_and(|deadline| WasmInstant::now() >= deadline)
        };
        if expired(deadline) {
            return transitions;
        }

        for to in RuleEngine::compute_valid_moves(state) {
            let action = GameAction::Move { to };
            if let Ok(next_state) = self.simulate_state(state, &action) {
                transitions.push((action, next_state));
            }
        }

        if self.config.score_walls {
            for (first, second) in self.candidate_walls(state) {
                if expired(deadline) {
                    break;
                }
                let action = GameAction::PlaceWall { first, second };
                if let Ok(next_state) = self.simulate_state(state, &action) {
                    transitions.push((action, next_state));
                }
            }
        }

        transitions
    }

    /// 当前行动方可考虑的合法墙。
    fn candidate_walls(&self, state: &GameState) -> Vec<(WallSegment, WallSegment)> {
        if state.walls_left(state.current_player) == 0 {
            return Vec::new();
        }

        match self.config.wall_filter {
            WallFilter::All => RuleEngine::legal_walls(state),
            WallFilter::Nearby { radius, limit } => {
                let size = state.size();
                let mover = state.active_position();
                let target = state.position(state.current_player.opponent());
                let radius = f64::from(radius);

                let mut ranked: Vec<(f64, WallSegment, WallSegment)> = wall_slots(size)
                    .iter()
                    .filter_map(|&(first, second)| {
                        let centre = wall_center(first, second);
                        let to_target = distance_to(centre, target);
                        let keep = to_target <= radius
                            || distance_to(centre, mover) <= radius
                            || controls_corridor(size, first, second)
                            || creates_chokepoint(size, first, second);
                        keep.then_some((to_target, first, second))
                    })
                    .collect();
                ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

                ranked
                    .into_iter()
                    .filter(|(_, first, second)| {
                        RuleEngine::is_wall_placement_legal(state, *first, *second)
                    })
                    .take(limit)
                    .map(|(_, first, second)| (first, second))
                    .collect()
            }
        }
    }

    /// 静态评估之外的根节点修正：墙的形状加分，走回头路扣分。
    fn action_bonus(&self, state: &GameState, action: &GameAction, next_state: &GameState) -> f64 {
        match *action {
            GameAction::Move { to } => -self
                .memory
                .repetition_penalty(to, self.config.weights.repetition),
            GameAction::PlaceWall { first, second } => {
                let opponent = state.current_player.opponent();
                let their_delay = match (
                    state.goal_distance(opponent),
                    next_state.goal_distance(opponent),
                ) {
                    (Some(before), Some(after)) => after.saturating_sub(before),
                    _ => 0,
                };
                self.wall_shape_bonus(state.size(), first, second, their_delay)
            }
        }
    }

    fn wall_shape_bonus(
        &self,
        size: u8,
        first: WallSegment,
        second: WallSegment,
        their_delay: u32,
    ) -> f64 {
        let weights = &self.config.weights;
        let mut bonus = 0.0;
        if controls_corridor(size, first, second) {
            bonus += weights.corridor;
        }
        if creates_chokepoint(size, first, second) {
            bonus += weights.chokepoint;
        }
        if their_delay >= 2 {
            bonus += weights.detour;
        }
        bonus
    }

    fn simulate_state(
        &self,
        state: &GameState,
        action: &GameAction,
    ) -> Result<GameState, RuleError> {
        let mut next_state = state.clone();
        action.apply(&RuleEngine::new(), &mut next_state)?;
        Ok(next_state)
    }

    fn simulate_resolution(
        &self,
        state: &GameState,
        action: &GameAction,
    ) -> Result<RuleResolution, RuleError> {
        let mut next_state = state.clone();
        let events = action.apply(&RuleEngine::new(), &mut next_state)?;
        Ok(RuleResolution::new(next_state, events))
    }

    fn evaluate_action(&self, state: &GameState, action: &GameAction) -> f64 {
        self.simulate_state(state, action)
            .map(|next_state| self.evaluate(&next_state, state.current_player))
            .unwrap_or(-WIN_SCORE)
    }

    fn evaluate(&self, state: &GameState, player: Player) -> f64 {
        if let Some(winner) = state.winner {
            return if winner == player {
                WIN_SCORE
            } else {
                -WIN_SCORE
            };
        }

        let opponent = player.opponent();
        let (Some(own), Some(theirs)) = (state.goal_distance(player), state.goal_distance(opponent))
        else {
            return -WIN_SCORE;
        };

        let size = state.size();
        let weights = &self.config.weights;
        let position = state.position(player);
        let centre = size / 2;

        let progress = f64::from(size - 1 - player.rows_to_goal(position.row, size));
        let centre_bonus = (5.0 - f64::from(position.col.abs_diff(centre))).max(0.0);
        let mobility = state.board.open_neighbours(position).count() as f64;
        let on_edge = if position.col == 0 || position.col == size - 1 {
            1.0
        } else {
            0.0
        };
        let wall_balance = f64::from(state.walls_left(player)) - f64::from(state.walls_left(opponent));

        (f64::from(theirs) - f64::from(own)) * weights.path
            + progress * weights.progress
            + centre_bonus * weights.centre
            + mobility * weights.mobility
            + wall_balance * weights.walls_in_hand
            - on_edge * weights.edge
    }
}

fn distances_after(state: &GameState, first: WallSegment, second: WallSegment) -> Option<(u32, u32)> {
    let scratch = state.board.with_wall(first, second);
    let size = state.size();
    let me = state.current_player;
    let opponent = me.opponent();
    Some((
        scratch.shortest_distance(state.position(me), me.goal_row(size))?,
        scratch.shortest_distance(state.position(opponent), opponent.goal_row(size))?,
    ))
}

fn fallback_action(state: &GameState, moves: &[Position]) -> Option<GameAction> {
    let goal = state.current_player.goal_row(state.size());
    moves
        .iter()
        .copied()
        .min_by_key(|target| {
            state
                .board
                .shortest_distance(*target, goal)
                .unwrap_or(u32::MAX)
        })
        .map(|to| GameAction::Move { to })
        .or_else(|| {
            RuleEngine::legal_walls(state)
                .first()
                .map(|&(first, second)| GameAction::PlaceWall { first, second })
        })
}

fn distance_to((row, col): (f64, f64), position: Position) -> f64 {
    (row - f64::from(position.row)).abs() + (col - f64::from(position.col)).abs()
}

fn central_band(size: u8, value: f64) -> bool {
    let centre = f64::from(size / 2);
    value >= centre - 1.0 && value <= centre + 1.0
}

/// 墙的中心落在中间三列。
fn controls_corridor(size: u8, first: WallSegment, second: WallSegment) -> bool {
    let (_, col) = wall_center(first, second);
    central_band(size, col.floor())
}

/// 横墙在中间三行，或竖墙在中间三列。
fn creates_chokepoint(size: u8, first: WallSegment, second: WallSegment) -> bool {
    let (row, col) = wall_center(first, second);
    match first.orientation {
        WallOrientation::Horizontal => central_band(size, row),
        WallOrientation::Vertical => central_band(size, col),
    }
}
