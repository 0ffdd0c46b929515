//! 任务执行器线程
//!
//! 独立于 100Hz 心跳循环的第二条线程：从队列取任务、设置目标速度、
//! 等待持续时间、推进任务状态。
//!
//! 并发契约：执行器在等待期间不持有任何锁，只通过
//! `update_target_velocity` / `set_idle` 触碰速度状态，
//! 因此等待期间心跳循环照常以 100Hz 运行。取消是协作式的：
//! 等待结束后检查任务是否仍归自己所有，被取消的任务保持 `Cancelled`。

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tracing::info;

use super::ManagerCore;
use super::task::TaskCommand;
use crate::manager::TaskStatus;

// 队列为空时的休眠间隔，避免空转消耗 CPU
const IDLE_POLL: Duration = Duration::from_millis(50);

/// 执行器循环入口
pub(crate) fn run(core: Arc<ManagerCore>) {
    info!("[TaskExecutor] 任务执行器线程已启动");

    while core.executor_running.load(Ordering::Relaxed) {
        let task = core.tasks.lock().pop_next();

        match task {
            Some(task) => {
                info!("[TaskExecutor] 开始执行任务: {} ({})", task.task_id, task.command.kind());
                dispatch(&core, &task.command, task.duration_s);

                // 等待结束后任务可能已被急停/打断取消
                if let Some((task_id, status)) = core.tasks.lock().finish_current() {
                    match status {
                        TaskStatus::Completed => info!("[TaskExecutor] 任务完成: {}", task_id),
                        other => info!("[TaskExecutor] 任务结束: {} ({:?})", task_id, other),
                    }
                }
            }
            None => thread::sleep(IDLE_POLL),
        }
    }

    info!("[TaskExecutor] 任务执行器线程已退出");
}

/// 按任务类型分发执行
fn dispatch(core: &ManagerCore, command: &TaskCommand, duration_s: f64) {
    let wait = if duration_s.is_finite() {
        Duration::from_secs_f64(duration_s.max(0.0))
    } else {
        Duration::ZERO
    };

    match *command {
        TaskCommand::Move { vx, vy, vyaw } => {
            info!(
                "[TaskExecutor] 移动: vx={:.2}, vy={:.2}, vyaw={:.2}, duration={:.2}s",
                vx, vy, vyaw, duration_s
            );
            core.update_target_velocity(vx, vy, vyaw, Some(duration_s));
            thread::sleep(wait);
        }
        TaskCommand::Rotate { vyaw, degrees } => {
            info!(
                "[TaskExecutor] 旋转: {:.1}°, vyaw={:.2}, duration={:.2}s",
                degrees, vyaw, duration_s
            );
            core.update_target_velocity(0.0, 0.0, vyaw, Some(duration_s));
            thread::sleep(wait);
        }
        TaskCommand::Stop => {
            info!("[TaskExecutor] 停止机器人");
            core.set_idle();
        }
    }
}
