//! Cancellable scheduled tasks.
//!
//! Every timed behavior of an agent (attack phases, stun, turn-around, the
//! periodic idle-voice and walk-sound loops, the death linger) is a task in
//! the agent's [`TaskSet`]. A task resumes once simulation time passes its
//! due time. Cancelling removes it, so a cancelled task can never resume.

use rampart_common::TaskHandle;
use serde::{Deserialize, Serialize};

use crate::agent::AgentState;

/// Shortest period a periodic task may repeat at, in seconds.
pub const MIN_TASK_PERIOD: f64 = 0.01;

/// What a task does when it resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Alert pause before chasing.
    AlertDelay,
    /// Cap on how long a chase may last.
    PursuitTimeout,
    /// Boundary between attack phases.
    AttackPhase,
    /// End of the post-hit stun.
    Stun,
    /// End of the turn-around pause.
    TurnAround,
    /// Periodic idle voice line.
    IdleVoice,
    /// Periodic footstep sound.
    WalkSound,
    /// Delay between death and removal.
    DeathLinger,
}

impl TaskKind {
    /// Whether a task of this kind may stay scheduled while the agent is in
    /// `state`. Loops failing this check are cancelled when the state is
    /// entered; entry tasks are cancelled through their handles.
    #[must_use]
    pub const fn runs_in(self, state: AgentState) -> bool {
        match self {
            Self::AlertDelay => matches!(state, AgentState::Alert),
            Self::PursuitTimeout => matches!(state, AgentState::AttackMoving),
            Self::AttackPhase => matches!(state, AgentState::Attacking),
            Self::Stun => matches!(state, AgentState::HitTaken),
            Self::TurnAround => matches!(state, AgentState::Passive),
            Self::IdleVoice => matches!(state, AgentState::Passive | AgentState::NormalMoving),
            Self::WalkSound => {
                matches!(state, AgentState::NormalMoving | AgentState::AttackMoving)
            },
            Self::DeathLinger => matches!(state, AgentState::Dead),
        }
    }

    /// Whether this kind repeats until cancelled.
    #[must_use]
    pub const fn is_periodic(self) -> bool {
        matches!(self, Self::IdleVoice | Self::WalkSound)
    }
}

/// A pending task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Handle issued when the task was scheduled
    pub handle: TaskHandle,
    /// What the task does
    pub kind: TaskKind,
    /// Simulation time at which it resumes
    pub resume_at: f64,
    /// Repeat interval for periodic tasks
    pub period: Option<f64>,
}

/// All pending tasks of one agent.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tasks: Vec<ScheduledTask>,
    next_handle: u64,
}

impl TaskSet {
    /// Creates an empty task set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self) -> TaskHandle {
        self.next_handle += 1;
        TaskHandle::from_raw(self.next_handle)
    }

    /// Schedules a one-shot task `delay` seconds after `now`.
    pub fn schedule(&mut self, kind: TaskKind, now: f64, delay: f64) -> TaskHandle {
        let handle = self.issue();
        self.tasks.push(ScheduledTask {
            handle,
            kind,
            resume_at: now + delay.max(0.0),
            period: None,
        });
        handle
    }

    /// Schedules a task that resumes every `period` seconds until cancelled.
    /// Periods are raised to [`MIN_TASK_PERIOD`].
    pub fn schedule_periodic(&mut self, kind: TaskKind, now: f64, period: f64) -> TaskHandle {
        let period = if period.is_finite() {
            period.max(MIN_TASK_PERIOD)
        } else {
            MIN_TASK_PERIOD
        };
        let handle = self.issue();
        self.tasks.push(ScheduledTask {
            handle,
            kind,
            resume_at: now + period,
            period: Some(period),
        });
        handle
    }

    /// Cancels one task. Returns false if it already resumed or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.handle != handle);
        self.tasks.len() != before
    }

    /// Cancels every task of `kind`, returning how many were removed.
    pub fn cancel_kind(&mut self, kind: TaskKind) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.kind != kind);
        before - self.tasks.len()
    }

    /// Cancels everything.
    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    /// Whether a task of `kind` is pending.
    #[must_use]
    pub fn is_pending(&self, kind: TaskKind) -> bool {
        self.tasks.iter().any(|t| t.kind == kind)
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Pops the earliest task due at `now`.
    ///
    /// Periodic tasks are re-armed for the first period boundary after `now`
    /// and stay pending; missed periods are skipped, not replayed.
    /// The caller resumes tasks one at a time so that a resumed task can
    /// cancel the rest before they run.
    pub fn pop_due(&mut self, now: f64) -> Option<ScheduledTask> {
        let index = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.resume_at <= now)
            .min_by(|a, b| a.1.resume_at.total_cmp(&b.1.resume_at))
            .map(|(i, _)| i)?;

        let task = self.tasks[index];
        match task.period {
            Some(period) => {
                let slot = &mut self.tasks[index];
                let missed = ((now - slot.resume_at) / period).floor();
                slot.resume_at += period * (missed + 1.0);
                if slot.resume_at <= now {
                    slot.resume_at = now + period;
                }
            },
            None => {
                self.tasks.remove(index);
            },
        }
        Some(task)
    }
}
