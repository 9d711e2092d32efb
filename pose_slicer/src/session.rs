//! One play session: Selecting → Playing → Finished.
//!
//! `GameSession` owns every per-session component and is the only place
//! score and energy change.  The app drives it with two cadences:
//!
//! * [`GameSession::scheduler_tick`] every scheduler period, which turns
//!   due beat steps into spawned notes;
//! * [`GameSession::simulation_tick`] every frame, which advances notes,
//!   judges hands and body, applies score and energy, and checks for the
//!   end of the session.
//!
//! Audio is borrowed per call, never stored.

use std::sync::Arc;

use beat_midi::{AudioOutput, BeatScheduler, Lane, ObstacleKind, Pattern, Spawn, TrackBuffer};
use pose_stream::{Hand, PoseSignalProcessor, Vec2};
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::judge::{self, Judgement};
use crate::notes::{EntityId, LifecycleEvent, NoteLifecycleManager};
use crate::score::{Grade, Scoreboard};
use crate::skill::{Overdrive, SkillTransition};

// ════════════════════════════════════════════════════════════════════════════
// Phase / track / events
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionPhase {
    Selecting,
    Playing,
    /// Terminal for this session; `start` begins a fresh one.
    Finished { score: u64, grade: Grade },
}

#[derive(Clone, Debug)]
pub enum SessionTrack {
    /// The authored groove at this tempo.
    Synth { bpm: f64 },
    /// A decoded user track; notes follow its low band.
    Recorded(Arc<TrackBuffer>),
}

impl SessionTrack {
    pub fn label(&self) -> String {
        match self {
            SessionTrack::Synth { bpm } => format!("synth {} bpm", bpm),
            SessionTrack::Recorded(t)   => t.name.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishReason { EnergyDepleted, TimeUp }

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionEvent {
    Sliced    { id: EntityId, hand: Hand, points: u64, position: Vec2, angle: f32 },
    HazardHit { id: EntityId, hand: Hand, position: Vec2 },
    Missed    { id: EntityId, lane: Lane },
    ObstacleHit    { kind: ObstacleKind },
    ObstacleDodged { kind: ObstacleKind },
    OverdriveStarted,
    OverdriveEnded,
    OverdriveReady,
    Finished  { score: u64, grade: Grade, reason: FinishReason },
}

type FinishCallback = Box<dyn FnMut(u64, Grade)>;

// ════════════════════════════════════════════════════════════════════════════
// GameSession
// ════════════════════════════════════════════════════════════════════════════

pub struct GameSession {
    config:     GameConfig,
    phase:      SessionPhase,
    notes:      NoteLifecycleManager,
    scoreboard: Scoreboard,
    overdrive:  Overdrive,
    scheduler:  Option<BeatScheduler>,
    started_at: f64,
    duration:   f64,
    elapsed:    f64,
    on_finish:  Option<FinishCallback>,
}

impl GameSession {
    pub fn new(config: GameConfig) -> Self {
        GameSession {
            phase:      SessionPhase::Selecting,
            notes:      NoteLifecycleManager::new(config.notes.clone()),
            scoreboard: Scoreboard::new(config.scoring.clone()),
            overdrive:  Overdrive::new(config.overdrive.clone()),
            scheduler:  None,
            started_at: 0.0,
            duration:   config.session.session_seconds,
            elapsed:    0.0,
            on_finish:  None,
            config,
        }
    }

    /// Called with `(final_score, grade)` whenever a session finishes.
    pub fn on_finish(&mut self, f: impl FnMut(u64, Grade) + 'static) {
        self.on_finish = Some(Box::new(f));
    }

    /// Begin a fresh session.  Everything from the previous one is dropped.
    pub fn start(&mut self, track: SessionTrack, audio: &mut dyn AudioOutput) {
        if let Some(s) = &mut self.scheduler { s.stop(); }
        audio.stop_all();

        self.notes      = NoteLifecycleManager::new(self.config.notes.clone());
        self.scoreboard = Scoreboard::new(self.config.scoring.clone());
        self.overdrive  = Overdrive::new(self.config.overdrive.clone());

        let mut sched_cfg = self.config.scheduler.clone();
        let scheduler = match &track {
            SessionTrack::Synth { bpm } => {
                sched_cfg.bpm = *bpm;
                self.duration = self.config.session.session_seconds;
                BeatScheduler::synth(sched_cfg, Pattern::authored())
            }
            SessionTrack::Recorded(buffer) => {
                self.duration = buffer.duration();
                audio.play_track(Arc::clone(buffer));
                BeatScheduler::energy(sched_cfg, self.config.energy.clone())
            }
        };

        let now = audio.now();
        let mut scheduler = scheduler;
        scheduler.start(now);
        self.scheduler  = Some(scheduler);
        self.started_at = now;
        self.elapsed    = 0.0;
        self.phase      = SessionPhase::Playing;
        info!(duration = self.duration, track = %track.label(), "session started");
    }

    /// Run the beat scheduler once and spawn whatever fell due.  Returns
    /// how many entities were spawned.
    pub fn scheduler_tick(&mut self, audio: &mut dyn AudioOutput) -> usize {
        if self.phase != SessionPhase::Playing { return 0; }
        let Some(scheduler) = &mut self.scheduler else { return 0 };

        let mut spawned = 0;
        for step in scheduler.tick(audio) {
            for spawn in step.spawns {
                self.notes.spawn(spawn);
                if matches!(spawn, Spawn::Note { .. }) {
                    self.scoreboard.register_note();
                }
                spawned += 1;
            }
        }
        spawned
    }

    /// One simulation step.  Does nothing outside `Playing`.
    pub fn simulation_tick(
        &mut self,
        pose:  &PoseSignalProcessor,
        audio: &mut dyn AudioOutput,
    ) -> Vec<SessionEvent> {
        if self.phase != SessionPhase::Playing { return Vec::new(); }
        self.elapsed = audio.now() - self.started_at;

        let mut events = Vec::new();
        let mut depleted = false;

        for ev in self.notes.advance(self.scoreboard.score()) {
            match ev {
                LifecycleEvent::Missed { id, lane } => {
                    depleted |= self.scoreboard.miss();
                    events.push(SessionEvent::Missed { id, lane });
                }
                LifecycleEvent::Expired { .. } => {}
                LifecycleEvent::ObstacleArrived { id, kind } => {
                    match judge::obstacle_cleared(&self.config.judge, kind, pose.body()) {
                        Some(false) => {
                            self.notes.mark_obstacle_hit(id);
                            depleted |= self.scoreboard.obstacle();
                            events.push(SessionEvent::ObstacleHit { kind });
                        }
                        cleared => {
                            if cleared.is_none() { debug!(?kind, "obstacle passed untracked body"); }
                            events.push(SessionEvent::ObstacleDodged { kind });
                        }
                    }
                }
            }
        }

        for j in judge::judge_notes(&self.config.judge, &mut self.notes, pose) {
            match j {
                Judgement::Hit { id, hand, position, angle, .. } => {
                    let points = self.scoreboard.hit(self.overdrive.boost());
                    events.push(SessionEvent::Sliced { id, hand, points, position, angle });
                }
                Judgement::HazardHit { id, hand, position } => {
                    depleted |= self.scoreboard.hazard();
                    events.push(SessionEvent::HazardHit { id, hand, position });
                }
            }
        }

        match self.overdrive.update(self.scoreboard.combo(), self.elapsed) {
            Some(SkillTransition::Activated) => events.push(SessionEvent::OverdriveStarted),
            Some(SkillTransition::Expired)   => events.push(SessionEvent::OverdriveEnded),
            Some(SkillTransition::Recharged) => events.push(SessionEvent::OverdriveReady),
            None => {}
        }

        self.notes.compact();

        let reason = if depleted {
            Some(FinishReason::EnergyDepleted)
        } else if self.elapsed >= self.duration {
            Some(FinishReason::TimeUp)
        } else {
            None
        };
        if let Some(reason) = reason {
            events.push(self.finish(reason, audio));
        }
        events
    }

    fn finish(&mut self, reason: FinishReason, audio: &mut dyn AudioOutput) -> SessionEvent {
        if let Some(s) = &mut self.scheduler { s.stop(); }
        audio.stop_all();

        let score = self.scoreboard.score();
        let grade = self.scoreboard.grade();
        self.phase = SessionPhase::Finished { score, grade };
        info!(
            score,
            %grade,
            ?reason,
            hits = self.scoreboard.hit_notes(),
            total = self.scoreboard.total_notes(),
            max_combo = self.scoreboard.max_combo(),
            "session finished"
        );
        if let Some(cb) = &mut self.on_finish {
            cb(score, grade);
        }
        SessionEvent::Finished { score, grade, reason }
    }

    /// Stop everything and go back to track selection.  Safe to call from
    /// any phase, any number of times.
    pub fn abort(&mut self, audio: &mut dyn AudioOutput) {
        match self.phase {
            SessionPhase::Selecting => {}
            SessionPhase::Playing => {
                if let Some(s) = &mut self.scheduler { s.stop(); }
                audio.stop_all();
                self.notes.clear();
                self.phase = SessionPhase::Selecting;
                info!(elapsed = self.elapsed, "session aborted");
            }
            SessionPhase::Finished { .. } => {
                self.notes.clear();
                self.phase = SessionPhase::Selecting;
            }
        }
    }

    pub fn phase(&self) -> SessionPhase { self.phase }
    pub fn is_playing(&self) -> bool { self.phase == SessionPhase::Playing }
    pub fn scoreboard(&self) -> &Scoreboard { &self.scoreboard }
    pub fn notes(&self) -> &NoteLifecycleManager { &self.notes }
    pub fn overdrive(&self) -> &Overdrive { &self.overdrive }
    pub fn scheduler(&self) -> Option<&BeatScheduler> { self.scheduler.as_ref() }
    pub fn config(&self) -> &GameConfig { &self.config }
    /// Session time at the last simulation tick.
    pub fn elapsed(&self) -> f64 { self.elapsed }
    pub fn duration(&self) -> f64 { self.duration }
    pub fn remaining(&self) -> f64 { (self.duration - self.elapsed).max(0.0) }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
