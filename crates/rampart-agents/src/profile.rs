//! Agent capability records.
//!
//! Every agent variant runs the same state machine. What differs between a
//! grunt, a mook and an aero is captured here: speeds, ranges, timings, clip
//! pools, and two behavior hooks ([`MovementStyle`] and [`AttackStyle`]).

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rampart_common::RampartError;

use crate::error::ConfigError;
use crate::narrator::AudioCue;
use crate::physics::LayerMask;
use crate::tasks::MIN_TASK_PERIOD;

// ============================================================================
// Variants and hooks
// ============================================================================

/// Kind of agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentVariant {
    /// Light ground melee enemy ("grunt").
    GroundMelee,
    /// Slow, tough ground melee enemy ("mook").
    HeavyMelee,
    /// Flying ranged enemy ("aero").
    FlyingRanged,
    /// Plain ground enemy template.
    GroundGeneric,
}

impl AgentVariant {
    /// Get display name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::GroundMelee => "Grunt",
            Self::HeavyMelee => "Mook",
            Self::FlyingRanged => "Aero",
            Self::GroundGeneric => "Ground Enemy",
        }
    }

    /// Get all variants.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [
            Self::GroundMelee,
            Self::HeavyMelee,
            Self::FlyingRanged,
            Self::GroundGeneric,
        ]
    }
}

impl fmt::Display for AgentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for AgentVariant {
    type Err = RampartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grunt" | "groundmelee" => Ok(Self::GroundMelee),
            "mook" | "heavymelee" => Ok(Self::HeavyMelee),
            "aero" | "flyingranged" => Ok(Self::FlyingRanged),
            "ground" | "groundgeneric" => Ok(Self::GroundGeneric),
            _ => Err(RampartError::unsupported("agent", s)),
        }
    }
}

/// How the agent moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MovementStyle {
    /// Walks on ground, probes edges and walls, gravity applies.
    Ground,
    /// Flies: no edge probe, no gravity, holds a position offset from the
    /// target while chasing.
    Flying {
        /// Desired position relative to the target. `x` is measured back
        /// toward the agent's side, `y` is height above the target.
        hover_offset: Vec2,
    },
}

impl MovementStyle {
    /// Whether the ground-edge probe applies to this style.
    #[must_use]
    pub const fn probes_edges(self) -> bool {
        matches!(self, Self::Ground)
    }
}

/// How the agent hurts its target during the active attack phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AttackStyle {
    /// Hitbox overlap in front of the agent.
    Melee,
    /// Fires a projectile once per attack.
    Ranged {
        /// Projectile speed in units per second
        projectile_speed: f32,
    },
}

// ============================================================================
// Settings groups
// ============================================================================

/// Timing of one attack, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackTiming {
    /// Duration of windup phase
    pub windup: f64,
    /// Duration of active phase
    pub active: f64,
    /// Duration of recovery phase
    pub recovery: f64,
}

impl Default for AttackTiming {
    fn default() -> Self {
        Self::medium()
    }
}

impl AttackTiming {
    /// Create new attack timing. The active phase never collapses to zero.
    #[must_use]
    pub fn new(windup: f64, active: f64, recovery: f64) -> Self {
        Self {
            windup: windup.max(0.0),
            active: active.max(0.01),
            recovery: recovery.max(0.0),
        }
    }

    /// Get total attack duration.
    #[must_use]
    pub fn total_duration(&self) -> f64 {
        self.windup + self.active + self.recovery
    }

    /// Quick jab.
    #[must_use]
    pub fn fast() -> Self {
        Self::new(0.25, 0.1, 0.3)
    }

    /// Standard swing.
    #[must_use]
    pub fn medium() -> Self {
        Self::new(0.35, 0.15, 0.4)
    }

    /// Heavy overhead.
    #[must_use]
    pub fn heavy() -> Self {
        Self::new(0.6, 0.2, 0.6)
    }
}

/// Geometry and layers for perception probes. Offsets are local to a
/// right-facing agent and get mirrored on flip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Half-extents of the agent's collider
    pub body_half_extents: Vec2,
    /// Ground-check anchor
    pub ground_check_offset: Vec2,
    /// Downward reach of the ground probe
    pub ground_probe_distance: f32,
    /// Extra reach of the wall probe past the collider edge
    pub wall_margin: f32,
    /// Center of the detection box
    pub detection_offset: Vec2,
    /// Half-extents of the detection box
    pub detection_half_extents: Vec2,
    /// Center of the attack hitbox
    pub attack_offset: Vec2,
    /// Half-extents of the attack hitbox
    pub attack_half_extents: Vec2,
    /// Reach of the line-of-sight ray
    pub sight_distance: f32,
    /// Layers counted as ground
    pub ground_mask: LayerMask,
    /// Layers that stop the agent
    pub wall_mask: LayerMask,
    /// Layers holding hostile targets
    pub target_mask: LayerMask,
    /// Layers that block line of sight (targets included)
    pub sight_mask: LayerMask,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            body_half_extents: Vec2::new(0.5, 0.5),
            ground_check_offset: Vec2::new(0.45, -0.45),
            ground_probe_distance: 0.25,
            wall_margin: 0.1,
            detection_offset: Vec2::new(3.5, 0.0),
            detection_half_extents: Vec2::new(4.0, 1.5),
            attack_offset: Vec2::new(0.9, 0.0),
            attack_half_extents: Vec2::new(0.6, 0.6),
            sight_distance: 12.0,
            ground_mask: LayerMask::GROUND,
            wall_mask: LayerMask::WALL | LayerMask::HAZARD,
            target_mask: LayerMask::TARGET,
            sight_mask: LayerMask::GROUND | LayerMask::WALL | LayerMask::TARGET,
        }
    }
}

/// Movement tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSettings {
    /// Speed while patrolling
    pub patrol_speed: f32,
    /// Speed while chasing
    pub aggro_speed: f32,
    /// Pause between spotting the target and chasing it
    pub alert_delay: f64,
    /// Pause after turning around at an edge or wall
    pub turn_around_delay: f64,
    /// Longest a single chase may last
    pub max_pursuit: f64,
    /// Movement hook
    pub style: MovementStyle,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            patrol_speed: 1.5,
            aggro_speed: 3.5,
            alert_delay: 0.5,
            turn_around_delay: 0.6,
            max_pursuit: 6.0,
            style: MovementStyle::Ground,
        }
    }
}

/// Health, damage and hit reactions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatSettings {
    /// Starting health
    pub max_health: u32,
    /// Damage dealt per hit
    pub attack_damage: u32,
    /// Multiplier on damage taken from a powered attacker
    pub powered_damage_multiplier: u32,
    /// Knockback impulse: `x` is scaled by the hit direction, `y` is upward
    pub knockback: Vec2,
    /// Invulnerable stun after a hit
    pub stun_duration: f64,
    /// Time between death and removal
    pub death_linger: f64,
    /// Attack phase timing
    pub timing: AttackTiming,
    /// Attack hook
    pub style: AttackStyle,
}

impl Default for CombatSettings {
    fn default() -> Self {
        Self {
            max_health: 4,
            attack_damage: 1,
            powered_damage_multiplier: 1,
            knockback: Vec2::new(4.0, 5.0),
            stun_duration: 0.4,
            death_linger: 1.5,
            timing: AttackTiming::medium(),
            style: AttackStyle::Melee,
        }
    }
}

/// Narration tuning and clip pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationSettings {
    /// Period of the idle voice loop
    pub idle_voice_period: f64,
    /// Period of the footstep loop
    pub walk_sound_period: f64,
    /// Clip names per cue
    pub clips: BTreeMap<AudioCue, Vec<String>>,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            idle_voice_period: 4.0,
            walk_sound_period: 0.45,
            clips: BTreeMap::new(),
        }
    }
}

impl NarrationSettings {
    /// Fills every cue with `<prefix>_<cue>_<n>` clip names.
    #[must_use]
    pub fn with_standard_clips(mut self, prefix: &str, per_cue: usize) -> Self {
        for cue in AudioCue::all() {
            let names = (1..=per_cue)
                .map(|n| format!("{prefix}_{}_{n:02}", cue.name()))
                .collect();
            self.clips.insert(cue, names);
        }
        self
    }

    /// Clips configured for a cue (empty if none).
    #[must_use]
    pub fn pool(&self, cue: AudioCue) -> &[String] {
        self.clips.get(&cue).map_or(&[], Vec::as_slice)
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Complete capability record for one agent variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Variant this profile describes
    pub variant: AgentVariant,
    /// Perception geometry
    pub probes: ProbeSettings,
    /// Movement tuning
    pub motion: MotionSettings,
    /// Combat tuning
    pub combat: CombatSettings,
    /// Narration tuning
    pub narration: NarrationSettings,
}

impl AgentProfile {
    /// Default profile for a variant.
    #[must_use]
    pub fn for_variant(variant: AgentVariant) -> Self {
        match variant {
            AgentVariant::GroundMelee => Self {
                variant,
                probes: ProbeSettings::default(),
                motion: MotionSettings::default(),
                combat: CombatSettings {
                    powered_damage_multiplier: 2,
                    ..CombatSettings::default()
                },
                narration: NarrationSettings::default().with_standard_clips("grunt", 3),
            },
            AgentVariant::HeavyMelee => Self {
                variant,
                probes: ProbeSettings {
                    body_half_extents: Vec2::new(0.7, 0.8),
                    ground_check_offset: Vec2::new(0.65, -0.75),
                    attack_offset: Vec2::new(1.2, 0.0),
                    attack_half_extents: Vec2::new(0.8, 0.8),
                    ..ProbeSettings::default()
                },
                motion: MotionSettings {
                    patrol_speed: 1.0,
                    aggro_speed: 2.5,
                    alert_delay: 0.8,
                    ..MotionSettings::default()
                },
                combat: CombatSettings {
                    max_health: 8,
                    attack_damage: 2,
                    knockback: Vec2::new(2.0, 3.0),
                    stun_duration: 0.3,
                    timing: AttackTiming::heavy(),
                    ..CombatSettings::default()
                },
                narration: NarrationSettings::default().with_standard_clips("mook", 2),
            },
            AgentVariant::FlyingRanged => Self {
                variant,
                probes: ProbeSettings {
                    detection_offset: Vec2::new(4.0, -1.5),
                    detection_half_extents: Vec2::new(5.0, 3.5),
                    attack_offset: Vec2::new(3.0, -2.0),
                    attack_half_extents: Vec2::new(3.0, 2.5),
                    sight_distance: 16.0,
                    ..ProbeSettings::default()
                },
                motion: MotionSettings {
                    patrol_speed: 2.0,
                    aggro_speed: 4.0,
                    max_pursuit: 8.0,
                    style: MovementStyle::Flying {
                        hover_offset: Vec2::new(4.0, 3.0),
                    },
                    ..MotionSettings::default()
                },
                combat: CombatSettings {
                    max_health: 3,
                    powered_damage_multiplier: 2,
                    knockback: Vec2::new(3.0, 2.0),
                    timing: AttackTiming::fast(),
                    style: AttackStyle::Ranged {
                        projectile_speed: 8.0,
                    },
                    ..CombatSettings::default()
                },
                narration: NarrationSettings::default().with_standard_clips("aero", 2),
            },
            AgentVariant::GroundGeneric => Self {
                variant,
                probes: ProbeSettings::default(),
                motion: MotionSettings {
                    patrol_speed: 1.2,
                    aggro_speed: 3.0,
                    ..MotionSettings::default()
                },
                combat: CombatSettings {
                    max_health: 5,
                    ..CombatSettings::default()
                },
                narration: NarrationSettings::default().with_standard_clips("enemy", 1),
            },
        }
    }

    /// Set movement speeds.
    #[must_use]
    pub fn with_speeds(mut self, patrol: f32, aggro: f32) -> Self {
        self.motion.patrol_speed = patrol;
        self.motion.aggro_speed = aggro;
        self
    }

    /// Set starting health.
    #[must_use]
    pub fn with_health(mut self, health: u32) -> Self {
        self.combat.max_health = health;
        self
    }

    /// Set attack timing.
    #[must_use]
    pub fn with_timing(mut self, timing: AttackTiming) -> Self {
        self.combat.timing = timing;
        self
    }

    /// Set the clip pool for one cue.
    #[must_use]
    pub fn with_clips(mut self, cue: AudioCue, clips: Vec<String>) -> Self {
        self.narration.clips.insert(cue, clips);
        self
    }

    /// Parses a profile from RON text and validates it.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let profile: Self = ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Serializes the profile as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Checks the profile for values the state machine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.probes;
        if self.motion.style.probes_edges() && p.ground_mask.is_empty() {
            return Err(ConfigError::MissingLayerMask { probe: "ground" });
        }
        if p.wall_mask.is_empty() {
            return Err(ConfigError::MissingLayerMask { probe: "wall" });
        }
        if p.target_mask.is_empty() {
            return Err(ConfigError::MissingLayerMask { probe: "target" });
        }
        if !p.sight_mask.intersects(p.target_mask) {
            return Err(ConfigError::MissingLayerMask { probe: "sight" });
        }
        if p.body_half_extents.x <= 0.0 || p.body_half_extents.y <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "body_half_extents",
                reason: "must be positive",
            });
        }
        if !(self.motion.patrol_speed.is_finite() && self.motion.patrol_speed >= 0.0)
            || !(self.motion.aggro_speed.is_finite() && self.motion.aggro_speed >= 0.0)
        {
            return Err(ConfigError::InvalidValue {
                field: "speed",
                reason: "must be finite and non-negative",
            });
        }
        if self.combat.max_health == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_health",
                reason: "must be at least 1",
            });
        }
        let durations = [
            self.motion.alert_delay,
            self.motion.turn_around_delay,
            self.motion.max_pursuit,
            self.combat.stun_duration,
            self.combat.death_linger,
            self.combat.timing.windup,
            self.combat.timing.active,
            self.combat.timing.recovery,
        ];
        if durations.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "duration",
                reason: "must be finite and non-negative",
            });
        }
        let periods = [
            self.narration.walk_sound_period,
            self.narration.idle_voice_period,
        ];
        if periods.iter().any(|p| !p.is_finite() || *p < MIN_TASK_PERIOD) {
            return Err(ConfigError::InvalidValue {
                field: "narration period",
                reason: "must be finite and at least 0.01s",
            });
        }
        Ok(())
    }
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self::for_variant(AgentVariant::GroundGeneric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles_validate() {
        for variant in AgentVariant::all() {
            let profile = AgentProfile::for_variant(variant);
            assert_eq!(profile.variant, variant);
            assert!(profile.validate().is_ok(), "{variant} profile invalid");
        }
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!("grunt".parse::<AgentVariant>().ok(), Some(AgentVariant::GroundMelee));
        assert_eq!("AERO".parse::<AgentVariant>().ok(), Some(AgentVariant::FlyingRanged));
        assert!("dragon".parse::<AgentVariant>().is_err());
    }

    #[test]
    fn test_only_ground_styles_probe_edges() {
        assert!(MovementStyle::Ground.probes_edges());
        assert!(!MovementStyle::Flying {
            hover_offset: Vec2::ZERO
        }
        .probes_edges());
    }

    #[test]
    fn test_attack_timing() {
        let timing = AttackTiming::new(0.1, 0.1, 0.2);
        assert!((timing.total_duration() - 0.4).abs() < 1e-9);
        assert_eq!(AttackTiming::new(-1.0, 0.0, -1.0).active, 0.01);
    }

    #[test]
    fn test_missing_target_mask_is_config_error() {
        let mut profile = AgentProfile::default();
        profile.probes.target_mask = LayerMask::NONE;
        assert_eq!(
            profile.validate(),
            Err(ConfigError::MissingLayerMask { probe: "target" })
        );
    }

    #[test]
    fn test_flying_profile_ignores_ground_mask() {
        let mut profile = AgentProfile::for_variant(AgentVariant::FlyingRanged);
        profile.probes.ground_mask = LayerMask::NONE;
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_zero_health_rejected() {
        let profile = AgentProfile::default().with_health(0);
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::InvalidValue {
                field: "max_health",
                ..
            })
        ));
    }

    #[test]
    fn test_tiny_narration_period_rejected() {
        let mut profile = AgentProfile::default();
        profile.narration.walk_sound_period = 1e-20;
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::InvalidValue {
                field: "narration period",
                ..
            })
        ));

        let mut profile = AgentProfile::default();
        profile.narration.idle_voice_period = f64::INFINITY;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_standard_clips() {
        let profile = AgentProfile::for_variant(AgentVariant::GroundMelee);
        let pool = profile.narration.pool(AudioCue::Alert);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool[0], "grunt_alert_01");
    }

    #[test]
    fn test_ron_round_trip() {
        let profile = AgentProfile::for_variant(AgentVariant::FlyingRanged);
        let text = profile.to_ron_string().expect("serialize");
        let parsed = AgentProfile::from_ron_str(&text).expect("parse");
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_ron_rejects_invalid_profile() {
        let mut profile = AgentProfile::default();
        profile.motion.patrol_speed = -1.0;
        let text = profile.to_ron_string().expect("serialize");
        assert!(matches!(
            AgentProfile::from_ron_str(&text),
            Err(ConfigError::InvalidValue { field: "speed", .. })
        ));
        assert!(matches!(
            AgentProfile::from_ron_str("not ron at all"),
            Err(ConfigError::Parse(_))
        ));
    }
}
