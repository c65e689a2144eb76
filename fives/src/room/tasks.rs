//! Deferred work for the room actor.
//!
//! Every timer the actor arms is tracked here so it can be canceled or
//! replaced; on teardown [`Scheduler::cancel_all`] (and `Drop`) aborts
//! anything still pending. Fired timers deliver a [`RoomTask`] back into
//! the room inbox, so the work itself still runs inside the actor's
//! critical section.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::messages::{RoomMessage, RoomTask};

#[derive(Debug, Default)]
pub struct Scheduler {
    ai_turn: Option<AbortHandle>,
    turn_timer: Option<AbortHandle>,
    lock_release: Option<AbortHandle>,
    idle_check: Option<AbortHandle>,
}

impl Scheduler {
    fn arm(
        slot: &mut Option<AbortHandle>,
        tx: mpsc::Sender<RoomMessage>,
        delay: Duration,
        task: RoomTask,
    ) {
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RoomMessage::Task(task)).await;
        });
        *slot = Some(handle.abort_handle());
    }

    pub fn schedule_ai_turn(&mut self, tx: mpsc::Sender<RoomMessage>, delay: Duration, epoch: u64) {
        Self::arm(&mut self.ai_turn, tx, delay, RoomTask::AiTurn { epoch });
    }

    pub fn schedule_turn_timeout(
        &mut self,
        tx: mpsc::Sender<RoomMessage>,
        delay: Duration,
        epoch: u64,
    ) {
        Self::arm(
            &mut self.turn_timer,
            tx,
            delay,
            RoomTask::TurnTimeout { epoch },
        );
    }

    pub fn schedule_lock_release(
        &mut self,
        tx: mpsc::Sender<RoomMessage>,
        delay: Duration,
        epoch: u64,
    ) {
        Self::arm(
            &mut self.lock_release,
            tx,
            delay,
            RoomTask::LockExpired { epoch },
        );
    }

    pub fn schedule_idle_check(&mut self, tx: mpsc::Sender<RoomMessage>, delay: Duration) {
        Self::arm(&mut self.idle_check, tx, delay, RoomTask::IdleCheck);
    }

    pub fn cancel_turn_timers(&mut self) {
        for slot in [&mut self.ai_turn, &mut self.turn_timer] {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    pub fn cancel_lock_release(&mut self) {
        if let Some(handle) = self.lock_release.take() {
            handle.abort();
        }
    }

    pub fn cancel_idle_check(&mut self) {
        if let Some(handle) = self.idle_check.take() {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel_turn_timers();
        self.cancel_lock_release();
        self.cancel_idle_check();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
