//! G1 Motion - 语音交互人形机器人运动控制核心
//!
//! 位于异步、延迟不定的语言理解前端（LLM / ASR）与硬实时的 Unitree G1 运动 SDK
//! 之间的安全中间层。无论上游是否卡顿（大模型推理、网络抖动、音频处理），
//! 都保证以稳定的 100Hz 向机器人发送运动指令。
//!
//! # 子系统
//!
//! - [`manager`]: ActionManager —— 100Hz 心跳守护线程 + 任务队列 + 抢占模型
//! - [`bridge`]: Bridge 层 —— 工具调用的参数校验与分发（含旋转角度规划）
//! - [`interrupt`]: 打断协调 —— ASR 打断、播放中止、响应取消的原子抢占
//! - [`estop`]: 终端键盘急停监听（SSH/Headless）
//! - [`sdk`]: 机器人 SDK 抽象层（运动指令为不透明的外部命令接收端）
//! - [`config`]: 安全包络配置（速度 / 角度 / 持续时间限制）
//!
//! # 数据流
//!
//! 外部调用方 → Bridge（校验）→ ActionManager::add_task → 任务队列 →
//! 任务执行器 → update_target_velocity → 心跳循环 → SDK。
//! 抢占路径绕过队列：emergency_stop() 清空队列、置 EMERGENCY、同步 damp()。

pub mod bridge;
pub mod config;
pub mod estop;
pub mod interrupt;
pub mod manager;
pub mod sdk;

// 重新导出常用类型
pub use bridge::{Bridge, ToolCall, ToolResult, ToolStatus};
pub use config::SafetyEnvelope;
pub use estop::EmergencyKeyListener;
pub use interrupt::{PlaybackControl, ResponseCoordinator, ResponseTransport, TranscriptDisposition};
pub use manager::{ActionManager, ActionType, RobotState, RobotTask, TaskCommand, TaskStatus};
pub use sdk::{ArmActionClient, LocoClient, SdkError};
