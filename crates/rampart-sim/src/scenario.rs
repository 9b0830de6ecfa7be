//! Arena scenario runner.
//!
//! Owns the world, the registry, the arena director and the dummy, and drives
//! them with the simulated clock: fixed steps for agent movement, kinematics
//! and projectiles, then one variable step per frame for agent logic, the
//! dummy's swings and the director.

use anyhow::Context;
use glam::Vec2;
use std::collections::BTreeMap;
use std::fs;
use tracing::{debug, info, trace};

use rampart_agents::{
    Aabb, AgentContext, AgentProfile, AgentRegistry, AgentResult, AgentVariant, ArenaDirector,
    ArenaEvent, AudioChannel, AudioCue, AudioOutput, AudioSink, Collider, CombatEvent,
    DamageOutcome, MovementStyle, Narrator, PlaybackRequest, SpawnPoint, StaticWorld,
    TargetStatus, VoiceGate, Wave,
};
use rampart_common::{AgentId, Facing};

use crate::config::{SimConfig, WaveConfig};
use crate::dummy::{Dummy, Swing};
use crate::timing::SimClock;

/// Top of the arena floor.
const FLOOR_TOP: f32 = 0.0;
/// Height of the arena walls.
const WALL_HEIGHT: f32 = 12.0;
/// Altitude flyers spawn at.
const FLYER_SPAWN_ALTITUDE: f32 = 4.0;
/// Seconds a projectile lives.
const PROJECTILE_LIFETIME: f64 = 3.0;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Render frames simulated
    pub frames: u64,
    /// Physics steps simulated
    pub physics_steps: u64,
    /// Accepted state transitions
    pub transitions: u64,
    /// Melee hits landed on the dummy
    pub melee_hits: u64,
    /// Projectiles fired by agents
    pub projectiles_fired: u64,
    /// Projectiles that struck the dummy
    pub projectile_hits: u64,
    /// Dummy swings that hurt an agent
    pub agent_hits: u64,
    /// Dummy swings an agent shrugged off
    pub ignored_hits: u64,
    /// Agents killed by the dummy
    pub kills: u64,
    /// Agents respawned by the director
    pub respawns: u64,
    /// Waves cleared
    pub waves_cleared: u64,
    /// Voice lines played
    pub voice_lines: u64,
    /// Sound effects played
    pub sounds: u64,
}

/// Audio backend that only counts what it is asked to play.
#[derive(Debug, Default)]
pub struct AudioLog {
    voices: u64,
    sounds: u64,
    by_cue: BTreeMap<AudioCue, u64>,
}

impl AudioLog {
    /// Plays of one cue.
    #[must_use]
    pub fn count(&self, cue: AudioCue) -> u64 {
        self.by_cue.get(&cue).copied().unwrap_or(0)
    }
}

impl AudioSink for AudioLog {
    fn play(&mut self, request: PlaybackRequest) {
        trace!(agent = %request.agent, cue = %request.cue, clip = %request.clip, "Play");
        match request.cue.channel() {
            AudioChannel::Voice => self.voices += 1,
            AudioChannel::Sound => self.sounds += 1,
        }
        *self.by_cue.entry(request.cue).or_default() += 1;
    }
}

#[derive(Debug, Clone, Copy)]
struct Projectile {
    owner: AgentId,
    position: Vec2,
    velocity: Vec2,
    damage: u32,
    expires_at: f64,
}

/// A running arena.
#[derive(Debug)]
pub struct Scenario {
    config: SimConfig,
    clock: SimClock,
    world: StaticWorld,
    registry: AgentRegistry,
    director: ArenaDirector,
    narrator: Narrator,
    audio: AudioLog,
    camera: Aabb,
    dummy: Dummy,
    projectiles: Vec<Projectile>,
    stats: SimStats,
}

/// Context for one agent call. Takes the fields separately so the registry
/// can be borrowed mutably next to it.
fn context<'a>(
    now: f64,
    world: &'a StaticWorld,
    dummy: &'a Dummy,
    narrator: &'a mut Narrator,
    audio: &'a mut AudioLog,
    camera: &'a Aabb,
) -> AgentContext<'a> {
    AgentContext {
        now,
        world,
        target: dummy,
        narrator,
        audio: AudioOutput {
            viewport: camera,
            sink: audio,
        },
    }
}

impl Scenario {
    /// Builds the arena and spawns the first wave.
    pub fn new(config: SimConfig) -> anyhow::Result<Self> {
        let mut registry = AgentRegistry::new();
        for path in &config.profiles {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading profile {}", path.display()))?;
            let profile = AgentProfile::from_ron_str(&text)
                .with_context(|| format!("loading profile {}", path.display()))?;
            info!(variant = %profile.variant, path = %path.display(), "Profile override loaded");
            registry.set_profile(profile);
        }

        let waves = config
            .waves
            .iter()
            .enumerate()
            .map(|(index, wave)| {
                layout_wave(&registry, wave, config.arena_half_width)
                    .with_context(|| format!("wave {index}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let dummy = Dummy::new(&config, 0.0, FLOOR_TOP);
        let world = arena_world(config.arena_half_width)
            .with(Collider::target(dummy.bounds(), dummy.handle()));
        let camera = Aabb::from_center(
            dummy.position(),
            Vec2::new(config.camera_half_width, config.camera_half_height),
        );

        let mut director = ArenaDirector::new(&mut registry, waves, config.respawn_delay);
        let narrator = Narrator::new(VoiceGate::new(config.voice_interval), config.seed);
        let mut stats = SimStats::default();
        for event in director.start(&mut registry) {
            record_arena_event(&mut stats, event);
        }

        Ok(Self {
            clock: SimClock::new(config.render_fps, config.physics_hz),
            config,
            world,
            registry,
            director,
            narrator,
            audio: AudioLog::default(),
            camera,
            dummy,
            projectiles: Vec::new(),
            stats,
        })
    }

    /// Runs until the configured duration elapses or every wave is cleared.
    pub fn run(&mut self) -> AgentResult<SimStats> {
        let frames = (self.config.duration_secs / self.clock.frame_dt()).ceil() as u64;
        for _ in 0..frames {
            if self.director.is_finished() {
                break;
            }
            self.frame()?;
        }
        Ok(self.stats())
    }

    /// Simulates one render frame.
    pub fn frame(&mut self) -> AgentResult<()> {
        let steps = self.clock.advance();
        let now = self.clock.now();
        for _ in 0..steps {
            self.physics_step(now)?;
        }
        self.logic_step(now)
    }

    fn physics_step(&mut self, now: f64) -> AgentResult<()> {
        let events = {
            let mut ctx = context(
                now,
                &self.world,
                &self.dummy,
                &mut self.narrator,
                &mut self.audio,
                &self.camera,
            );
            self.registry.fixed_update_all(&mut ctx)?
        };
        let dt = self.clock.fixed_dt() as f32;
        self.integrate(dt);
        self.step_projectiles(dt, now);
        self.handle_events(events, now);
        Ok(())
    }

    fn logic_step(&mut self, now: f64) -> AgentResult<()> {
        if self.dummy.revive_if_due(now) {
            self.world
                .insert(Collider::target(self.dummy.bounds(), self.dummy.handle()));
        }

        let events = {
            let mut ctx = context(
                now,
                &self.world,
                &self.dummy,
                &mut self.narrator,
                &mut self.audio,
                &self.camera,
            );
            self.registry.update_all(&mut ctx)?
        };
        self.handle_events(events, now);

        if let Some(swing) = self.dummy.try_swing(now) {
            self.strike(swing, now)?;
        }

        for event in self.director.tick(&mut self.registry, now) {
            record_arena_event(&mut self.stats, event);
        }
        Ok(())
    }

    /// Gravity, floor and walls for every agent. Flyers only move.
    fn integrate(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        let half_width = self.config.arena_half_width;
        let ids = self.registry.ids().to_vec();
        for id in ids {
            let Some(agent) = self.registry.get_mut(id) else {
                continue;
            };
            let flying = matches!(agent.profile().motion.style, MovementStyle::Flying { .. });
            let half = agent.profile().probes.body_half_extents;
            let mut velocity = agent.velocity();
            if !flying {
                velocity.y -= gravity * dt;
            }
            let mut position = agent.position() + velocity * dt;
            if position.y - half.y < FLOOR_TOP {
                position.y = FLOOR_TOP + half.y;
                velocity.y = velocity.y.max(0.0);
            }
            let limit = (half_width - half.x).max(0.0);
            position.x = position.x.clamp(-limit, limit);
            agent.set_position(position);
            agent.set_velocity(velocity);
        }
    }

    fn step_projectiles(&mut self, dt: f32, now: f64) {
        let half_width = self.config.arena_half_width;
        let target = self.dummy.bounds();
        let mut hits = Vec::new();
        self.projectiles.retain_mut(|p| {
            p.position += p.velocity * dt;
            if target.contains(p.position) {
                hits.push(*p);
                return false;
            }
            now < p.expires_at && p.position.x.abs() < half_width && p.position.y > FLOOR_TOP
        });
        for projectile in hits {
            if self.dummy.is_dead() {
                continue;
            }
            debug!(agent = %projectile.owner, damage = projectile.damage, "Projectile hit");
            self.stats.projectile_hits += 1;
            self.damage_dummy(projectile.damage, now);
        }
    }

    fn handle_events(&mut self, events: Vec<CombatEvent>, now: f64) {
        for event in events {
            match event {
                CombatEvent::StateChanged { .. } => self.stats.transitions += 1,
                CombatEvent::TargetHit { agent, damage, .. } => {
                    debug!(agent = %agent, damage, "Agent hit the dummy");
                    self.stats.melee_hits += 1;
                    self.damage_dummy(damage, now);
                },
                CombatEvent::ProjectileFired {
                    agent,
                    origin,
                    velocity,
                    damage,
                } => {
                    self.stats.projectiles_fired += 1;
                    self.projectiles.push(Projectile {
                        owner: agent,
                        position: origin,
                        velocity,
                        damage,
                        expires_at: now + PROJECTILE_LIFETIME,
                    });
                },
            }
        }
    }

    fn damage_dummy(&mut self, damage: u32, now: f64) {
        if self.dummy.take_hit(damage, now) {
            self.world.remove_target(self.dummy.handle());
        }
    }

    fn strike(&mut self, swing: Swing, now: f64) -> AgentResult<()> {
        let victims: Vec<(AgentId, Facing)> = self
            .registry
            .iter()
            .filter(|agent| !agent.is_dead())
            .filter_map(|agent| {
                self.dummy
                    .strike_direction(agent.position())
                    .map(|direction| (agent.id(), direction))
            })
            .collect();
        if victims.is_empty() {
            return Ok(());
        }

        debug!(powered = swing.powered, victims = victims.len(), "Dummy swing");
        let mut ctx = context(
            now,
            &self.world,
            &self.dummy,
            &mut self.narrator,
            &mut self.audio,
            &self.camera,
        );
        for (id, direction) in victims {
            match self
                .registry
                .receive_damage(id, &mut ctx, direction, swing.damage)?
            {
                DamageOutcome::Killed => self.stats.kills += 1,
                DamageOutcome::Staggered | DamageOutcome::Damaged => self.stats.agent_hits += 1,
                DamageOutcome::Ignored => self.stats.ignored_hits += 1,
            }
        }
        Ok(())
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> SimStats {
        SimStats {
            frames: self.clock.frames(),
            physics_steps: self.clock.steps(),
            voice_lines: self.audio.voices,
            sounds: self.audio.sounds,
            ..self.stats.clone()
        }
    }

    /// Audio counters.
    #[must_use]
    pub fn audio(&self) -> &AudioLog {
        &self.audio
    }

    /// The agent registry.
    #[must_use]
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// The arena director.
    #[must_use]
    pub fn director(&self) -> &ArenaDirector {
        &self.director
    }

    /// The dummy.
    #[must_use]
    pub fn dummy(&self) -> &Dummy {
        &self.dummy
    }

    /// Current simulation time.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.clock.now()
    }
}

fn record_arena_event(stats: &mut SimStats, event: ArenaEvent) {
    match event {
        ArenaEvent::WaveStarted(index) => debug!(wave = index, "Wave started"),
        ArenaEvent::Respawned { slot, agent } => {
            debug!(slot, agent = %agent, "Slot respawned");
            stats.respawns += 1;
        },
        ArenaEvent::WaveCleared(_) => stats.waves_cleared += 1,
        ArenaEvent::ArenaCleared => {},
    }
}

/// Floor spanning the arena and a wall at each end.
fn arena_world(half_width: f32) -> StaticWorld {
    StaticWorld::new()
        .with(Collider::ground(Aabb::new(
            Vec2::new(-half_width - 1.0, FLOOR_TOP - 1.0),
            Vec2::new(half_width + 1.0, FLOOR_TOP),
        )))
        .with(Collider::wall(Aabb::new(
            Vec2::new(-half_width - 1.0, FLOOR_TOP),
            Vec2::new(-half_width, FLOOR_TOP + WALL_HEIGHT),
        )))
        .with(Collider::wall(Aabb::new(
            Vec2::new(half_width, FLOOR_TOP),
            Vec2::new(half_width + 1.0, FLOOR_TOP + WALL_HEIGHT),
        )))
}

/// Places a wave's slots on alternating sides of the dummy, facing it.
fn layout_wave(
    registry: &AgentRegistry,
    wave: &WaveConfig,
    half_width: f32,
) -> anyhow::Result<Wave> {
    let spawns = wave
        .agents
        .iter()
        .enumerate()
        .map(|(slot, name)| -> anyhow::Result<SpawnPoint> {
            let variant: AgentVariant = name
                .parse()
                .with_context(|| format!("slot {slot}"))?;
            let profile = registry
                .profile(variant)
                .map_or_else(|| AgentProfile::for_variant(variant), |p| (**p).clone());

            let side = if slot % 2 == 0 { Facing::Right } else { Facing::Left };
            let ring = (slot / 2) as f32;
            let distance = (5.0 + 2.5 * ring).min(half_width - 1.5);
            let y = match profile.motion.style {
                MovementStyle::Flying { .. } => FLOOR_TOP + FLYER_SPAWN_ALTITUDE,
                MovementStyle::Ground => FLOOR_TOP + profile.probes.body_half_extents.y,
            };
            Ok(SpawnPoint {
                variant,
                position: Vec2::new(side.sign() * distance, y),
                facing: side.flipped(),
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Wave {
        spawns,
        respawns_per_slot: wave.respawns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short(duration_secs: f64) -> SimConfig {
        SimConfig {
            duration_secs,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_run_counts_frames() {
        let mut scenario = Scenario::new(short(2.0)).expect("scenario");
        let stats = scenario.run().expect("run");
        assert_eq!(stats.frames, 120);
        assert!((99..=100).contains(&stats.physics_steps));
        assert_eq!(scenario.registry().len(), 2);
    }

    #[test]
    fn test_agents_notice_the_dummy() {
        let mut scenario = Scenario::new(short(5.0)).expect("scenario");
        let stats = scenario.run().expect("run");
        assert!(stats.transitions > 0);
        assert!(stats.voice_lines > 0);
        assert!(scenario.audio().count(AudioCue::Alert) > 0);
    }

    #[test]
    fn test_walkers_rest_on_the_floor() {
        let mut scenario = Scenario::new(short(1.0)).expect("scenario");
        scenario.run().expect("run");
        for agent in scenario.registry().iter() {
            let half = agent.profile().probes.body_half_extents;
            assert!((agent.position().y - (FLOOR_TOP + half.y)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_runs_are_deterministic() {
        let first = Scenario::new(short(20.0))
            .and_then(|mut s| Ok(s.run()?))
            .expect("first run");
        let second = Scenario::new(short(20.0))
            .and_then(|mut s| Ok(s.run()?))
            .expect("second run");
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        let config = SimConfig {
            waves: vec![WaveConfig {
                agents: vec!["grunt".into(), "dragon".into()],
                respawns: 0,
            }],
            ..SimConfig::default()
        };
        let err = Scenario::new(config).expect_err("unknown variant");
        let chain = format!("{err:#}");
        assert!(chain.contains("wave 0"));
        assert!(chain.contains("dragon"));
    }

    #[test]
    fn test_no_waves_finishes_immediately() {
        let mut scenario = Scenario::new(SimConfig {
            waves: Vec::new(),
            ..short(10.0)
        })
        .expect("scenario");
        assert!(scenario.director().is_finished());
        assert_eq!(scenario.run().expect("run").frames, 0);
    }

    #[test]
    fn test_wave_layout_alternates_sides() {
        let registry = AgentRegistry::new();
        let wave = WaveConfig {
            agents: vec!["grunt".into(), "aero".into(), "mook".into()],
            respawns: 2,
        };
        let laid = layout_wave(&registry, &wave, 14.0).expect("layout");
        assert_eq!(laid.respawns_per_slot, 2);
        assert_eq!(laid.spawns[0].position, Vec2::new(5.0, 0.5));
        assert_eq!(laid.spawns[0].facing, Facing::Left);
        assert_eq!(laid.spawns[1].position, Vec2::new(-5.0, FLYER_SPAWN_ALTITUDE));
        assert_eq!(laid.spawns[1].facing, Facing::Right);
        assert_eq!(laid.spawns[2].position, Vec2::new(7.5, 0.8));
    }

    #[test]
    fn test_profile_override_from_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("grunt.ron");
        let profile = AgentProfile::for_variant(AgentVariant::GroundMelee).with_health(11);
        fs::write(&path, profile.to_ron_string().expect("ron")).expect("write");

        let scenario = Scenario::new(SimConfig {
            profiles: vec![path],
            ..short(0.0)
        })
        .expect("scenario");
        assert!(scenario.registry().iter().all(|a| a.health() == 11));
    }
}
