//! 目标速度状态定义
//!
//! 心跳循环每个 tick 读取一次；所有字段由同一把速度锁保护，
//! 临界区只做拷贝，持锁时间在微秒级。

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// SDK 侧硬限幅。比安全包络更严格，是发送指令前的最后一道防线。
pub(crate) const HARD_LIMIT_VX: f64 = 1.0;
pub(crate) const HARD_LIMIT_VY: f64 = 1.0;
pub(crate) const HARD_LIMIT_VYAW: f64 = 1.5;

/// 动作类型
///
/// 决定心跳循环每个 tick 向 SDK 发送什么指令：
/// `Emergency` 发送 damp，其余发送 set_velocity。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    /// 空闲（零速度）
    Idle,
    /// 移动中
    Move,
    /// 停止
    Stop,
    /// 紧急停止（阻尼模式）
    Emergency,
}

impl ActionType {
    /// 状态名称（用于日志与状态查询）
    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Idle => "IDLE",
            ActionType::Move => "MOVE",
            ActionType::Stop => "STOP",
            ActionType::Emergency => "EMERGENCY",
        }
    }
}

/// 目标速度状态（由速度锁保护）
///
/// 不变量：`action == Emergency` 时 `emergency == true` 且速度全零。
#[derive(Debug)]
pub(crate) struct VelocityState {
    pub vx: f64,
    pub vy: f64,
    pub vyaw: f64,
    pub action: ActionType,
    pub emergency: bool,
    /// 移动开始时刻（仅在指定了持续时间的移动中为 Some）
    pub move_started: Option<Instant>,
    /// None 表示持续移动直到收到新指令
    pub move_duration: Option<Duration>,
}

impl VelocityState {
    pub(crate) fn new() -> Self {
        Self {
            vx: 0.0,
            vy: 0.0,
            vyaw: 0.0,
            action: ActionType::Idle,
            emergency: false,
            move_started: None,
            move_duration: None,
        }
    }

    /// 速度与计时归零并切换动作类型
    pub(crate) fn zero(&mut self, action: ActionType, emergency: bool) {
        self.vx = 0.0;
        self.vy = 0.0;
        self.vyaw = 0.0;
        self.action = action;
        self.emergency = emergency;
        self.move_started = None;
        self.move_duration = None;
    }

    /// 当前移动是否已超过指定的持续时间
    pub(crate) fn move_expired(&self, now: Instant) -> bool {
        match (self.move_started, self.move_duration) {
            (Some(started), Some(duration)) => now.duration_since(started) > duration,
            _ => false,
        }
    }

    pub(crate) fn snapshot(&self) -> RobotState {
        RobotState {
            vx: self.vx,
            vy: self.vy,
            vyaw: self.vyaw,
            action: self.action,
            emergency: self.emergency,
        }
    }
}

/// [`crate::manager::ActionManager::get_state`] 返回的状态快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RobotState {
    pub vx: f64,
    pub vy: f64,
    pub vyaw: f64,
    pub action: ActionType,
    pub emergency: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_names() {
        assert_eq!(ActionType::Idle.name(), "IDLE");
        assert_eq!(ActionType::Move.name(), "MOVE");
        assert_eq!(ActionType::Stop.name(), "STOP");
        assert_eq!(ActionType::Emergency.name(), "EMERGENCY");
    }

    #[test]
    fn test_new_state_is_idle() {
        let state = VelocityState::new();
        assert_eq!(state.action, ActionType::Idle);
        assert!(!state.emergency);
        assert_eq!((state.vx, state.vy, state.vyaw), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_move_expired_requires_duration() {
        let mut state = VelocityState::new();
        let now = Instant::now();

        // 未指定持续时间：永不超时（持续移动）
        state.move_started = Some(now);
        state.move_duration = None;
        assert!(!state.move_expired(now + Duration::from_secs(3600)));

        // 指定持续时间：超过后判定为到期
        state.move_duration = Some(Duration::from_millis(200));
        assert!(!state.move_expired(now + Duration::from_millis(100)));
        assert!(state.move_expired(now + Duration::from_millis(250)));
    }

    #[test]
    fn test_zero_clears_timing() {
        let mut state = VelocityState::new();
        state.vx = 0.5;
        state.move_started = Some(Instant::now());
        state.move_duration = Some(Duration::from_secs(1));

        state.zero(ActionType::Emergency, true);
        assert_eq!(state.action, ActionType::Emergency);
        assert!(state.emergency);
        assert_eq!(state.vx, 0.0);
        assert!(state.move_started.is_none());
        assert!(state.move_duration.is_none());
    }

    #[test]
    fn test_action_type_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&ActionType::Emergency).unwrap(), "\"EMERGENCY\"");
        assert_eq!(serde_json::to_string(&ActionType::Idle).unwrap(), "\"IDLE\"");
    }
}
