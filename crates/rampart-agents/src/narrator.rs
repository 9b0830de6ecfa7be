//! Audio narration for agents.
//!
//! Agents never load or mix audio. They ask the [`Narrator`] to play a cue;
//! the narrator applies the gates (shared voice cooldown, viewport
//! visibility, non-empty clip pool), picks a clip uniformly at random and
//! hands a [`PlaybackRequest`] to the host's [`AudioSink`].

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use rampart_common::{AgentId, RampartError};

use crate::error::NarrationError;
use crate::physics::Aabb;
use crate::profile::NarrationSettings;

// ============================================================================
// Cues
// ============================================================================

/// Playback channel of a cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioChannel {
    /// Voice lines, rate-limited by the shared voice gate.
    Voice,
    /// Sound effects, never rate-limited.
    Sound,
}

impl AudioChannel {
    /// Lowercase channel name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Sound => "sound",
        }
    }
}

/// Narration category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AudioCue {
    /// Ambient muttering while patrolling
    Idle,
    /// Target spotted
    Alert,
    /// Attack windup
    Charge,
    /// Took damage
    Hurt,
    /// Died
    Death,
    /// Footstep or wing flap
    Footstep,
    /// Weapon swing
    Swing,
    /// Weapon connected
    Impact,
    /// Projectile launch
    Projectile,
}

impl AudioCue {
    /// Channel this cue plays on.
    #[must_use]
    pub const fn channel(self) -> AudioChannel {
        match self {
            Self::Idle | Self::Alert | Self::Charge | Self::Hurt | Self::Death => {
                AudioChannel::Voice
            },
            Self::Footstep | Self::Swing | Self::Impact | Self::Projectile => AudioChannel::Sound,
        }
    }

    /// Lowercase cue name, used in clip names and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Alert => "alert",
            Self::Charge => "charge",
            Self::Hurt => "hurt",
            Self::Death => "death",
            Self::Footstep => "footstep",
            Self::Swing => "swing",
            Self::Impact => "impact",
            Self::Projectile => "projectile",
        }
    }

    /// Every cue.
    #[must_use]
    pub const fn all() -> [Self; 9] {
        [
            Self::Idle,
            Self::Alert,
            Self::Charge,
            Self::Hurt,
            Self::Death,
            Self::Footstep,
            Self::Swing,
            Self::Impact,
            Self::Projectile,
        ]
    }
}

impl fmt::Display for AudioCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioCue {
    type Err = RampartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|cue| cue.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| RampartError::unsupported("audio cue", s))
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// A request handed to the audio backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    /// Agent that produced the cue
    pub agent: AgentId,
    /// Requested cue
    pub cue: AudioCue,
    /// Chosen clip name
    pub clip: String,
    /// World position of the emitter
    pub position: Vec2,
}

/// Host audio backend.
pub trait AudioSink {
    /// Queues a clip for playback.
    fn play(&mut self, request: PlaybackRequest);
}

impl AudioSink for Vec<PlaybackRequest> {
    fn play(&mut self, request: PlaybackRequest) {
        self.push(request);
    }
}

/// Host camera.
pub trait Viewport {
    /// Whether a world position is currently on screen.
    fn is_visible(&self, position: Vec2) -> bool;
}

/// Viewport that sees everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysVisible;

impl Viewport for AlwaysVisible {
    fn is_visible(&self, _position: Vec2) -> bool {
        true
    }
}

impl Viewport for Aabb {
    fn is_visible(&self, position: Vec2) -> bool {
        self.contains(position)
    }
}

// ============================================================================
// Voice gate
// ============================================================================

/// Cooldown shared by every agent that holds a clone of it.
///
/// The last-trigger time lives in one atomic word and is claimed with a
/// single compare-exchange, so the gate stays correct if agents are ever
/// ticked from several threads.
#[derive(Debug, Clone)]
pub struct VoiceGate {
    inner: Arc<GateState>,
}

#[derive(Debug)]
struct GateState {
    last_trigger: AtomicU64,
    min_interval: f64,
}

const NEVER: f64 = f64::NEG_INFINITY;

impl VoiceGate {
    /// Creates a gate with the given minimum interval in seconds.
    #[must_use]
    pub fn new(min_interval: f64) -> Self {
        Self {
            inner: Arc::new(GateState {
                last_trigger: AtomicU64::new(NEVER.to_bits()),
                min_interval: min_interval.max(0.0),
            }),
        }
    }

    /// Minimum interval between two voice lines.
    #[must_use]
    pub fn min_interval(&self) -> f64 {
        self.inner.min_interval
    }

    /// Time of the last voice line, if any.
    #[must_use]
    pub fn last_trigger(&self) -> Option<f64> {
        let last = f64::from_bits(self.inner.last_trigger.load(Ordering::Acquire));
        last.is_finite().then_some(last)
    }

    /// Whether a non-forced voice line could play at `now`.
    #[must_use]
    pub fn is_open(&self, now: f64) -> bool {
        let last = f64::from_bits(self.inner.last_trigger.load(Ordering::Acquire));
        now - last >= self.inner.min_interval
    }

    /// Claims the gate at `now`. Fails if the cooldown has not elapsed.
    pub fn try_claim(&self, now: f64) -> bool {
        let mut current = self.inner.last_trigger.load(Ordering::Acquire);
        loop {
            if now - f64::from_bits(current) < self.inner.min_interval {
                return false;
            }
            match self.inner.last_trigger.compare_exchange(
                current,
                now.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Records a voice line at `now` regardless of the cooldown.
    pub fn force(&self, now: f64) {
        self.inner.last_trigger.store(now.to_bits(), Ordering::Release);
    }

    /// Whether two handles share the same gate.
    #[must_use]
    pub fn shares_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for VoiceGate {
    fn default() -> Self {
        Self::new(1.0)
    }
}

// ============================================================================
// Narrator
// ============================================================================

/// What happened to a narration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    /// A clip was requested from the sink
    Played,
    /// The shared voice cooldown has not elapsed
    OnCooldown,
    /// The emitter is off screen
    NotVisible,
    /// No clips configured for the cue
    EmptyPool,
}

impl NarrationOutcome {
    /// Whether a clip was played.
    #[must_use]
    pub const fn played(self) -> bool {
        matches!(self, Self::Played)
    }
}

/// Who is speaking.
#[derive(Debug, Clone, Copy)]
pub struct Speaker<'a> {
    /// Emitting agent
    pub agent: AgentId,
    /// Emitter position
    pub position: Vec2,
    /// Clip pools of the agent's profile
    pub clips: &'a NarrationSettings,
}

/// Output side of narration: where audio goes and who can see it.
pub struct AudioOutput<'a> {
    /// Active camera
    pub viewport: &'a dyn Viewport,
    /// Audio backend
    pub sink: &'a mut dyn AudioSink,
}

/// Picks clips and requests playback.
#[derive(Debug, Clone)]
pub struct Narrator {
    gate: VoiceGate,
    rng: fastrand::Rng,
}

impl Narrator {
    /// Creates a narrator on `gate`, seeding clip selection with `seed`.
    #[must_use]
    pub fn new(gate: VoiceGate, seed: u64) -> Self {
        Self {
            gate,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// The shared voice gate.
    #[must_use]
    pub fn gate(&self) -> &VoiceGate {
        &self.gate
    }

    /// Plays a voice line.
    ///
    /// Non-forced lines are dropped while the shared cooldown runs. Forced
    /// lines skip the cooldown and restart it. Either way the speaker must be
    /// on screen.
    pub fn try_play_voice(
        &mut self,
        speaker: Speaker<'_>,
        cue: AudioCue,
        forced: bool,
        now: f64,
        output: &mut AudioOutput<'_>,
    ) -> Result<NarrationOutcome, NarrationError> {
        if cue.channel() != AudioChannel::Voice {
            return Err(NarrationError::UnsupportedCue {
                cue: cue.name(),
                channel: AudioChannel::Voice.name(),
            });
        }
        if !forced && !self.gate.is_open(now) {
            return Ok(NarrationOutcome::OnCooldown);
        }
        if !output.viewport.is_visible(speaker.position) {
            return Ok(NarrationOutcome::NotVisible);
        }
        let pool = speaker.clips.pool(cue);
        if pool.is_empty() {
            warn!(agent = %speaker.agent, cue = %cue, "No clips configured for voice cue");
            return Ok(NarrationOutcome::EmptyPool);
        }
        if forced {
            self.gate.force(now);
        } else if !self.gate.try_claim(now) {
            return Ok(NarrationOutcome::OnCooldown);
        }
        self.play(speaker, cue, pool, output);
        Ok(NarrationOutcome::Played)
    }

    /// Plays a sound effect. Sounds have no cooldown.
    pub fn try_play_sound(
        &mut self,
        speaker: Speaker<'_>,
        cue: AudioCue,
        output: &mut AudioOutput<'_>,
    ) -> Result<NarrationOutcome, NarrationError> {
        if cue.channel() != AudioChannel::Sound {
            return Err(NarrationError::UnsupportedCue {
                cue: cue.name(),
                channel: AudioChannel::Sound.name(),
            });
        }
        if !output.viewport.is_visible(speaker.position) {
            return Ok(NarrationOutcome::NotVisible);
        }
        let pool = speaker.clips.pool(cue);
        if pool.is_empty() {
            warn!(agent = %speaker.agent, cue = %cue, "No clips configured for sound cue");
            return Ok(NarrationOutcome::EmptyPool);
        }
        self.play(speaker, cue, pool, output);
        Ok(NarrationOutcome::Played)
    }

    fn play(
        &mut self,
        speaker: Speaker<'_>,
        cue: AudioCue,
        pool: &[String],
        output: &mut AudioOutput<'_>,
    ) {
        let clip = pool[self.rng.usize(..pool.len())].clone();
        debug!(agent = %speaker.agent, cue = %cue, clip = %clip, "Narration");
        output.sink.play(PlaybackRequest {
            agent: speaker.agent,
            cue,
            clip,
            position: speaker.position,
        });
    }
}

impl Default for Narrator {
    fn default() -> Self {
        Self::new(VoiceGate::default(), 0)
    }
}
