//! AI 对手模块（单一参数化评估器 + 短期记忆）。

pub mod memory;
pub mod minimax;

pub use memory::AiMemory;
pub use minimax::{
    AiAgent, AiConfig, AiDecision, AiDifficulty, BlockPolicy, DecisionReason, EvalWeights,
    GameAction, StrategicWallPolicy, WallFilter,
};
