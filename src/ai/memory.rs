use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::game::Position;

/// 记住的最近己方位置数量。
pub const HISTORY_LEN: usize = 6;
const REGION_SIZE: u8 = 3;
const STREAK_LIMIT: u32 = 3;

/// AI 自身的短期记忆，只用于打破来回踱步，不参与规则判定。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiMemory {
    recent: VecDeque<Position>,
    region: Option<(u8, u8)>,
    region_streak: u32,
}

impl AiMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, position: Position) {
        if self.recent.len() == HISTORY_LEN {
            self.recent.pop_front();
        }
        self.recent.push_back(position);

        let region = region_of(position);
        if self.region == Some(region) {
            self.region_streak += 1;
        } else {
            self.region = Some(region);
            self.region_streak = 1;
        }
    }

    pub fn recent(&self) -> impl Iterator<Item = Position> + '_ {
        self.recent.iter().copied()
    }

    pub fn region_streak(&self) -> u32 {
        self.region_streak
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// 走回 `target` 的惩罚分：每次近期到访计一次 `weight`，
    /// 在同一 3x3 区域停留过久再加半个。
    pub fn repetition_penalty(&self, target: Position, weight: f64) -> f64 {
        let visits = self.recent.iter().filter(|seen| **seen == target).count() as f64;
        let mut penalty = visits * weight;
        if self.region_streak >= STREAK_LIMIT && self.region == Some(region_of(target)) {
            penalty += weight * 0.5;
        }
        penalty
    }
}

fn region_of(position: Position) -> (u8, u8) {
    (position.row / REGION_SIZE, position.col / REGION_SIZE)
}
