//! 机器人任务与任务队列
//!
//! 任务由 Bridge 层创建、ActionManager 持有、任务执行器顺序消费。
//! 队列、当前任务、历史记录和 ID 计数器由一把独立于速度锁的任务锁保护，
//! 避免与心跳循环争锁。
//!
//! 时间戳使用相对进程启动的单调时间（微秒），不受系统时钟调整影响。

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

/// 历史记录默认容量（防止长时间运行导致内存增长）
pub(crate) const DEFAULT_HISTORY_CAPACITY: usize = 100;

// 进程启动时刻锚点：首次访问时设置，之后不变
static APP_START: OnceLock<Instant> = OnceLock::new();

/// 相对进程启动的单调时间（微秒）
pub(crate) fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// 任务状态
///
/// 状态只能单向推进：`Pending → Running → {Completed, Failed, Cancelled}`；
/// `Pending → Cancelled`（清空队列时）；`Running → Cancelled`（急停时）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 待执行
    Pending,
    /// 执行中（任意时刻至多一个任务处于此状态）
    Running,
    /// 已完成
    Completed,
    /// 失败
    Failed,
    /// 已取消
    Cancelled,
}

/// 任务指令
///
/// 序列化后与工具调用的 `{task_type, parameters}` 结构一致。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task_type", content = "parameters", rename_all = "lowercase")]
pub enum TaskCommand {
    /// 平移 + 旋转复合移动
    Move { vx: f64, vy: f64, vyaw: f64 },
    /// 原地旋转（degrees 仅用于记录，执行时只使用 vyaw）
    Rotate { vyaw: f64, degrees: f64 },
    /// 停止（切换空闲状态，瞬时完成）
    Stop,
}

impl TaskCommand {
    /// 任务类型名称（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            TaskCommand::Move { .. } => "move",
            TaskCommand::Rotate { .. } => "rotate",
            TaskCommand::Stop => "stop",
        }
    }
}

/// 机器人任务记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotTask {
    /// 进程内单调递增的任务标识（`task_0`, `task_1`, ...）
    pub task_id: String,
    #[serde(flatten)]
    pub command: TaskCommand,
    /// 持续时间（秒）
    pub duration_s: f64,
    pub status: TaskStatus,
    /// 创建时刻（相对进程启动，微秒）
    pub created_at_us: u64,
    /// 开始执行时刻
    pub started_at_us: Option<u64>,
    /// 结束时刻（完成/失败/取消）
    pub ended_at_us: Option<u64>,
    // 创建序号，淘汰时作为同一微秒内的并列裁决
    #[serde(skip)]
    pub(crate) seq: u64,
}

/// 任务面板：队列 + 当前任务 + 历史记录（由任务锁保护）
///
/// 不变量：队列中的任务状态恒为 `Pending`；历史记录不超过容量上限。
#[derive(Debug)]
pub(crate) struct TaskBoard {
    queue: VecDeque<RobotTask>,
    current: Option<RobotTask>,
    completed: HashMap<String, RobotTask>,
    next_id: u64,
    history_capacity: usize,
}

impl TaskBoard {
    pub(crate) fn new(history_capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            completed: HashMap::new(),
            next_id: 0,
            history_capacity,
        }
    }

    /// 追加任务到队列尾部，返回新任务 ID
    pub(crate) fn enqueue(&mut self, command: TaskCommand, duration_s: f64) -> String {
        let seq = self.next_id;
        let task_id = format!("task_{}", seq);
        self.next_id += 1;

        let kind = command.kind();
        let task = RobotTask {
            task_id: task_id.clone(),
            command,
            duration_s,
            status: TaskStatus::Pending,
            created_at_us: monotonic_micros(),
            started_at_us: None,
            ended_at_us: None,
            seq,
        };
        self.queue.push_back(task);
        info!("[TaskQueue] 任务已添加: {} ({}), 队列长度: {}", task_id, kind, self.queue.len());

        task_id
    }

    /// 取出队列头部任务并标记为执行中
    ///
    /// 返回任务快照供执行器使用；面板内的 `current` 保存权威副本，
    /// 取消操作只作用于权威副本。
    pub(crate) fn pop_next(&mut self) -> Option<RobotTask> {
        let mut task = self.queue.pop_front()?;
        task.status = TaskStatus::Running;
        task.started_at_us = Some(monotonic_micros());
        self.current = Some(task.clone());
        Some(task)
    }

    /// 执行器在任务动作结束后调用：若未被取消则标记完成
    ///
    /// 返回 `(task_id, 最终状态)`；若任务已被 [`Self::cancel_all`]
    /// 取走（急停/打断），返回 `None`。
    pub(crate) fn finish_current(&mut self) -> Option<(String, TaskStatus)> {
        let mut task = self.current.take()?;
        if task.status == TaskStatus::Running {
            task.status = TaskStatus::Completed;
        }
        task.ended_at_us = Some(monotonic_micros());
        let result = (task.task_id.clone(), task.status);
        self.insert_completed(task);
        Some(result)
    }

    /// 清空队列并取消当前任务（急停或打断时调用）
    ///
    /// 返回被取消的待执行任务数量。
    pub(crate) fn cancel_all(&mut self) -> usize {
        let now = monotonic_micros();
        let mut cancelled_count = 0;

        while let Some(mut task) = self.queue.pop_front() {
            task.status = TaskStatus::Cancelled;
            task.ended_at_us = Some(now);
            self.insert_completed(task);
            cancelled_count += 1;
        }

        if let Some(mut task) = self.current.take() {
            task.status = TaskStatus::Cancelled;
            task.ended_at_us = Some(now);
            self.insert_completed(task);
            info!("[TaskQueue] 当前任务已取消");
        }

        info!("[TaskQueue] 队列已清空，共取消 {} 个待执行任务", cancelled_count);
        cancelled_count
    }

    /// 查询任务：先查当前任务，再查队列，最后查历史记录
    pub(crate) fn find(&self, task_id: &str) -> Option<RobotTask> {
        if let Some(task) = &self.current {
            if task.task_id == task_id {
                return Some(task.clone());
            }
        }
        if let Some(task) = self.queue.iter().find(|t| t.task_id == task_id) {
            return Some(task.clone());
        }
        self.completed.get(task_id).cloned()
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// 历史记录写入，超出容量时淘汰创建时间最早的记录
    fn insert_completed(&mut self, task: RobotTask) {
        self.completed.insert(task.task_id.clone(), task);
        while self.completed.len() > self.history_capacity {
            let oldest = self
                .completed
                .values()
                .min_by_key(|t| (t.created_at_us, t.seq))
                .map(|t| t.task_id.clone());
            match oldest {
                Some(id) => {
                    self.completed.remove(&id);
                }
                None => break,
            }
        }
    }
}
