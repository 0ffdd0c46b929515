//! 机器人 SDK 抽象层
//!
//! 运动控制核心只通过这里定义的 trait 与 Unitree SDK 交互，
//! 测试用 Mock 客户端替换真实实现（真实实现经由 DDS/RPC 与机器人通信）。
//!
//! SDK 侧存在看门狗：指令流一旦中断就会切断运动，
//! 因此 [`LocoClient::set_velocity`] 可能以高达每秒 100 次的频率被调用。

use thiserror::Error;

// ==================== G1 Loco FSM 状态常量 ====================

/// 阻尼模式（关节阻尼，使机器人进入安全静止状态）
pub const FSM_ID_DAMP: u32 = 1;
/// 从躺倒恢复到站立
pub const FSM_ID_RECOVERY: u32 = 702;
/// 深蹲起立
pub const FSM_ID_SQUAT_UP: u32 = 706;

/// 手臂动作：面前挥手（face wave）
pub const ARM_ACTION_FACE_WAVE: u32 = 25;

/// SDK 调用错误
#[derive(Error, Debug)]
pub enum SdkError {
    /// RPC 调用返回非零错误码
    #[error("RPC call failed with code {code}")]
    Rpc { code: i32 },

    /// 传输层错误（DDS 断连、超时等）
    #[error("SDK transport error: {0}")]
    Transport(String),
}

/// G1 运动控制客户端（Loco 服务）
///
/// 对应底层 SDK 的 `SetVelocity` / `SetFsmId` 接口。
/// 所有方法都可能失败；调用方（心跳循环）把失败视为瞬态错误，
/// 记录日志后由下一个 tick 重试。
pub trait LocoClient: Send + Sync {
    /// 发送目标速度（vx: m/s, vy: m/s, vyaw: rad/s）
    fn set_velocity(&self, vx: f64, vy: f64, vyaw: f64) -> Result<(), SdkError>;

    /// 进入阻尼模式（FSM ID = [`FSM_ID_DAMP`]）
    fn damp(&self) -> Result<(), SdkError>;

    /// 深蹲起立（FSM ID = [`FSM_ID_SQUAT_UP`]），用于急停后恢复
    ///
    /// 倒地场景可能需要 [`FSM_ID_RECOVERY`]，依赖姿态感知，
    /// 当前恢复路径固定走深蹲起立。
    fn squat_to_stand(&self) -> Result<(), SdkError>;
}

/// G1 手臂动作客户端
pub trait ArmActionClient: Send + Sync {
    /// 执行预置手臂动作（如 [`ARM_ACTION_FACE_WAVE`]）
    fn execute_action(&self, action_id: u32) -> Result<(), SdkError>;
}
