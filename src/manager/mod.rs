//! ActionManager —— 动作管理器
//!
//! 核心职责：
//! 1. 以 100Hz 高频维持 SDK 心跳，防止大模型推理期间看门狗超时
//! 2. 异步接收目标速度指令与任务队列
//! 3. 提供急停与状态查询接口
//!
//! # 锁结构
//!
//! 两把互不嵌套的锁：速度锁（目标速度 + 动作类型 + 急停标志 + 计时）
//! 和任务锁（队列 + 当前任务 + 历史 + ID 计数器）。没有任何代码路径
//! 同时持有两把锁，不存在锁序问题。
//!
//! # 生命周期
//!
//! [`ActionManager::start`] 幂等地启动心跳线程与任务执行器线程；
//! [`ActionManager::stop`] 以 2 秒超时 join 两条线程，最后补发一条
//! 零速度指令。ActionManager 与进程同寿命，通过克隆（内部 `Arc`）
//! 分发到各调用线程。

mod executor;
mod heartbeat;
mod state;
mod task;

pub use state::{ActionType, RobotState};
pub use task::{RobotTask, TaskCommand, TaskStatus};

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::sdk::LocoClient;
use state::{HARD_LIMIT_VX, HARD_LIMIT_VY, HARD_LIMIT_VYAW, VelocityState};
use task::{DEFAULT_HISTORY_CAPACITY, TaskBoard};

// 关闭时等待线程退出的上限
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 心跳线程与执行器线程共享的内部状态
pub(crate) struct ManagerCore {
    pub(crate) sdk: Arc<dyn LocoClient>,
    /// 速度锁：目标速度、动作类型、急停标志、移动计时
    pub(crate) velocity: Mutex<VelocityState>,
    /// 任务锁：队列、当前任务、历史记录、ID 计数器
    pub(crate) tasks: Mutex<TaskBoard>,
    pub(crate) running: AtomicBool,
    pub(crate) executor_running: AtomicBool,
}

impl ManagerCore {
    /// 发送速度指令（never-throw：SDK 失败只记日志，下一个 tick 重试）
    pub(crate) fn send_move(&self, vx: f64, vy: f64, vyaw: f64) {
        if let Err(e) = self.sdk.set_velocity(vx, vy, vyaw) {
            error!("发送移动指令失败: {}", e);
        }
    }

    /// 发送阻尼指令（never-throw）
    pub(crate) fn send_damp(&self) {
        if let Err(e) = self.sdk.damp() {
            error!("发送阻尼指令失败: {}", e);
        }
    }

    /// 更新目标速度（见 [`ActionManager::update_target_velocity`]）
    pub(crate) fn update_target_velocity(
        &self,
        mut vx: f64,
        mut vy: f64,
        mut vyaw: f64,
        duration: Option<f64>,
    ) {
        // SDK 硬限幅：比安全包络更严格的最终防线
        if !vx.is_finite() || vx.abs() > HARD_LIMIT_VX {
            warn!("vx 超出安全范围: {}, 已截断至 [-{:.1}, {:.1}]", vx, HARD_LIMIT_VX, HARD_LIMIT_VX);
            vx = if vx.is_finite() { vx.clamp(-HARD_LIMIT_VX, HARD_LIMIT_VX) } else { 0.0 };
        }
        if !vy.is_finite() || vy.abs() > HARD_LIMIT_VY {
            warn!("vy 超出安全范围: {}, 已截断至 [-{:.1}, {:.1}]", vy, HARD_LIMIT_VY, HARD_LIMIT_VY);
            vy = if vy.is_finite() { vy.clamp(-HARD_LIMIT_VY, HARD_LIMIT_VY) } else { 0.0 };
        }
        if !vyaw.is_finite() || vyaw.abs() > HARD_LIMIT_VYAW {
            warn!(
                "vyaw 超出安全范围: {}, 已截断至 [-{:.1}, {:.1}]",
                vyaw, HARD_LIMIT_VYAW, HARD_LIMIT_VYAW
            );
            vyaw = if vyaw.is_finite() { vyaw.clamp(-HARD_LIMIT_VYAW, HARD_LIMIT_VYAW) } else { 0.0 };
        }

        let duration = match duration {
            Some(d) if d.is_finite() && d >= 0.0 => Some(Duration::from_secs_f64(d)),
            Some(d) => {
                warn!("duration 非法: {}, 按持续移动处理", d);
                None
            }
            None => None,
        };

        {
            let mut vs = self.velocity.lock();
            vs.vx = vx;
            vs.vy = vy;
            vs.vyaw = vyaw;
            vs.action = ActionType::Move;
            vs.emergency = false;
            vs.move_duration = duration;
            vs.move_started = duration.map(|_| Instant::now());
        }

        info!("目标速度已更新: vx={:.2}, vy={:.2}, vyaw={:.2}", vx, vy, vyaw);
    }

    /// 切换至空闲状态（速度归零）
    pub(crate) fn set_idle(&self) {
        self.velocity.lock().zero(ActionType::Idle, false);
        info!("已切换至空闲状态");
    }
}

/// 动作管理器（对外门面）
///
/// 所有入口都是线程安全的；克隆共享同一内部状态，
/// 回调方持有的克隆不会延长两条工作线程的生命周期。
#[derive(Clone)]
pub struct ActionManager {
    core: Arc<ManagerCore>,
    threads: Arc<Mutex<ThreadHandles>>,
}

#[derive(Default)]
struct ThreadHandles {
    heartbeat: Option<JoinHandle<()>>,
    executor: Option<JoinHandle<()>>,
}

impl ActionManager {
    /// 创建动作管理器
    ///
    /// # 参数
    ///
    /// - `sdk`: G1 运动控制客户端（管理器先于一切回调创建、后于其销毁）
    pub fn new(sdk: Arc<dyn LocoClient>) -> Self {
        Self::with_history_capacity(sdk, DEFAULT_HISTORY_CAPACITY)
    }

    /// 创建动作管理器并指定任务历史容量
    pub fn with_history_capacity(sdk: Arc<dyn LocoClient>, history_capacity: usize) -> Self {
        let manager = Self {
            core: Arc::new(ManagerCore {
                sdk,
                velocity: Mutex::new(VelocityState::new()),
                tasks: Mutex::new(TaskBoard::new(history_capacity)),
                running: AtomicBool::new(false),
                executor_running: AtomicBool::new(false),
            }),
            threads: Arc::new(Mutex::new(ThreadHandles::default())),
        };
        info!("ActionManager 初始化完成");
        manager
    }

    /// 启动心跳循环与任务执行器（幂等）
    pub fn start(&self) {
        if self.core.running.swap(true, Ordering::SeqCst) {
            warn!("ActionManager 已经在运行中, 无需重复启动");
            return;
        }
        self.core.executor_running.store(true, Ordering::SeqCst);

        let mut handles = self.threads.lock();

        let core = self.core.clone();
        handles.heartbeat = Some(thread::spawn(move || heartbeat::run(core)));
        info!("ActionManager 控制循环已启动 (100Hz)");

        let core = self.core.clone();
        handles.executor = Some(thread::spawn(move || executor::run(core)));
        info!("ActionManager 任务执行器已启动");
    }

    /// 停止两条工作线程并补发一条零速度指令
    ///
    /// join 超时 2 秒；超时的线程记录错误后放弃（不阻塞关闭流程）。
    pub fn stop(&self) {
        if !self.core.running.load(Ordering::SeqCst) {
            warn!("ActionManager 未在运行, 无需停止");
            return;
        }

        let mut handles = self.threads.lock();

        self.core.executor_running.store(false, Ordering::SeqCst);
        if let Some(handle) = handles.executor.take() {
            join_with_timeout(handle, "任务执行器");
        }

        self.core.running.store(false, Ordering::SeqCst);
        if let Some(handle) = handles.heartbeat.take() {
            join_with_timeout(handle, "控制循环");
        }

        // 停止前发送一次停止指令
        self.core.send_move(0.0, 0.0, 0.0);
        info!("已发送停止运动指令至机器人");
    }

    /// 心跳循环是否在运行
    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::SeqCst)
    }

    /// 异步更新目标速度（大模型 / 关键词匹配调用入口）
    ///
    /// # 参数
    ///
    /// - `vx`: 前进速度 (m/s, 硬限幅 ±1.0)
    /// - `vy`: 横向速度 (m/s, 硬限幅 ±1.0)
    /// - `vyaw`: 旋转速度 (rad/s, 硬限幅 ±1.5)
    /// - `duration`: 持续时间 (秒)，`None` 表示持续移动直到收到新指令
    ///
    /// 超出硬限幅的分量直接截断并告警；到期后由心跳循环自动切换空闲。
    pub fn update_target_velocity(&self, vx: f64, vy: f64, vyaw: f64, duration: Option<f64>) {
        self.core.update_target_velocity(vx, vy, vyaw, duration);
    }

    /// 切换至空闲状态（停止运动）
    pub fn set_idle(&self) {
        self.core.set_idle();
    }

    /// 紧急停止（最高优先级）
    ///
    /// 清空任务队列、置 EMERGENCY 状态，并**同步**发送阻尼指令，
    /// 不等待下一个心跳周期。重复调用无额外副作用（阻尼指令会重发）。
    pub fn emergency_stop(&self) {
        self.clear_task_queue();

        self.core.velocity.lock().zero(ActionType::Emergency, true);

        // 立即发送阻尼指令（不等待下一个控制循环周期）
        match self.core.sdk.damp() {
            Ok(()) => warn!("紧急停止已触发！机器人已切换至阻尼模式"),
            Err(e) => error!("紧急停止失败: {}", e),
        }
    }

    /// 从紧急停止状态恢复
    ///
    /// 仅在 EMERGENCY 状态下有效；恢复路径固定为深蹲起立。
    /// 返回 `false` 表示当前不在紧急状态或 SDK 调用失败。
    pub fn recover_from_emergency(&self) -> bool {
        {
            let mut vs = self.core.velocity.lock();
            if vs.action != ActionType::Emergency {
                warn!("当前不在紧急状态, 无需恢复");
                return false;
            }
            vs.action = ActionType::Idle;
            vs.emergency = false;
        }

        match self.core.sdk.squat_to_stand() {
            Ok(()) => {
                info!("已从紧急停止状态恢复 (Squat2StandUp)");
                true
            }
            Err(e) => {
                error!("从紧急状态恢复失败: {}", e);
                false
            }
        }
    }

    /// 获取当前状态快照（线程安全）
    pub fn get_state(&self) -> RobotState {
        self.core.velocity.lock().snapshot()
    }

    /// 添加任务到执行队列，返回任务 ID
    pub fn add_task(&self, command: TaskCommand, duration_s: f64) -> String {
        self.core.tasks.lock().enqueue(command, duration_s)
    }

    /// 清空任务队列（急停或打断时调用），返回取消的待执行任务数量
    pub fn clear_task_queue(&self) -> usize {
        self.core.tasks.lock().cancel_all()
    }

    /// 查询任务状态（依次检索当前任务、队列、历史记录）
    pub fn get_task_status(&self, task_id: &str) -> Option<RobotTask> {
        self.core.tasks.lock().find(task_id)
    }

    /// 当前队列中待执行的任务数量
    pub fn task_queue_len(&self) -> usize {
        self.core.tasks.lock().queue_len()
    }
}

/// 以 2 秒超时 join 线程；超时则记录错误并放弃句柄
fn join_with_timeout(handle: JoinHandle<()>, name: &str) {
    let start = Instant::now();
    while start.elapsed() < JOIN_TIMEOUT {
        if handle.is_finished() {
            if handle.join().is_err() {
                error!("{}线程 panic 退出", name);
            } else {
                info!("ActionManager {}已停止", name);
            }
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    error!("⚠️ {}线程未能在2秒内退出！", name);
}
