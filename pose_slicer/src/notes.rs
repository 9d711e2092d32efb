//! Notes, hazards and obstacles in flight.
//!
//! Every entity starts at `spawn_depth` and moves toward the player by a
//! fixed amount per simulation tick.  Depth 0 is the hit plane.
//!
//! ```text
//!  depth  spawn_depth ……… far_bound ═══ 0 ═══ near_bound ……… remove_depth
//!                              └── hittable ──┘
//! ```
//!
//! A regular note still unsliced when it passes `near_bound` is **Missed**;
//! a hazard is **Expired** at the same point, with no penalty.  Obstacles
//! are judged once, on the tick they cross the hit plane.  Anything past
//! `remove_depth` is dropped whatever its state.
//!
//! Removal is two-phase: entities are marked during the tick and dropped by
//! [`NoteLifecycleManager::compact`] once judging is done.

use beat_midi::{Direction, Lane, ObstacleKind, Spawn};
use pose_stream::{Hand, Vec2};
use serde::{Deserialize, Serialize};
use tracing::trace;

// ════════════════════════════════════════════════════════════════════════════
// NoteConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteConfig {
    pub spawn_depth:  f32,
    /// Depth units per simulation tick.
    pub speed:        f32,
    pub near_bound:   f32,
    pub far_bound:    f32,
    pub remove_depth: f32,
    /// Extra speed fraction per 1000 points scored.
    pub speed_ramp:   f32,
    /// Cap on the ramped speed, as a multiple of `speed`.
    pub max_speed_scale: f32,
}

impl Default for NoteConfig {
    fn default() -> Self {
        NoteConfig {
            spawn_depth:     24.0,
            speed:           0.2,
            near_bound:      -1.0,
            far_bound:       3.0,
            remove_depth:    -6.0,
            speed_ramp:      0.02,
            max_speed_scale: 1.6,
        }
    }
}

impl NoteConfig {
    pub fn speed_at(&self, score: u64) -> f32 {
        let scale = 1.0 + self.speed_ramp * (score as f32 / 1000.0);
        self.speed * scale.min(self.max_speed_scale).max(1.0)
    }
}

/// Screen position of a lane on the 4×3 grid.
pub fn lane_position(lane: Lane) -> Vec2 {
    Vec2::new(0.2 + 0.2 * lane.x() as f32, 0.3 + 0.2 * lane.y() as f32)
}

// ════════════════════════════════════════════════════════════════════════════
// Entities
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteKind {
    Regular { hand: Hand, direction: Direction },
    Hazard,
}

/// One-way: `Spawned` moves to exactly one of the others and stays there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteState { Spawned, Hit, Missed, Expired }

#[derive(Clone, Debug)]
pub struct Note {
    pub id:       EntityId,
    pub lane:     Lane,
    pub position: Vec2,
    pub depth:    f32,
    pub kind:     NoteKind,
    state:        NoteState,
    marked:       bool,
}

impl Note {
    pub fn state(&self) -> NoteState { self.state }
    pub fn is_hazard(&self) -> bool { self.kind == NoteKind::Hazard }
    pub fn required_hand(&self) -> Option<Hand> {
        match self.kind { NoteKind::Regular { hand, .. } => Some(hand), NoteKind::Hazard => None }
    }

    /// Move out of `Spawned`.  Terminal states never change again.
    fn settle(&mut self, to: NoteState) -> bool {
        if self.state != NoteState::Spawned || to == NoteState::Spawned { return false; }
        self.state = to;
        true
    }
}

#[derive(Clone, Debug)]
pub struct Obstacle {
    pub id:    EntityId,
    pub kind:  ObstacleKind,
    pub depth: f32,
    hit:       bool,
    judged:    bool,
    marked:    bool,
}

impl Obstacle {
    pub fn was_hit(&self) -> bool { self.hit }
    pub fn is_judged(&self) -> bool { self.judged }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LifecycleEvent {
    Missed          { id: EntityId, lane: Lane },
    Expired         { id: EntityId },
    ObstacleArrived { id: EntityId, kind: ObstacleKind },
}

// ════════════════════════════════════════════════════════════════════════════
// NoteLifecycleManager
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct NoteLifecycleManager {
    config:    NoteConfig,
    notes:     Vec<Note>,
    obstacles: Vec<Obstacle>,
    next_id:   u64,
}

impl NoteLifecycleManager {
    pub fn new(config: NoteConfig) -> Self {
        NoteLifecycleManager { config, notes: Vec::new(), obstacles: Vec::new(), next_id: 0 }
    }

    pub fn spawn(&mut self, spawn: Spawn) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        let depth = self.config.spawn_depth;
        match spawn {
            Spawn::Note { lane, hand, direction } => self.notes.push(Note {
                id, lane, position: lane_position(lane), depth,
                kind: NoteKind::Regular { hand, direction },
                state: NoteState::Spawned, marked: false,
            }),
            Spawn::Hazard { lane } => self.notes.push(Note {
                id, lane, position: lane_position(lane), depth,
                kind: NoteKind::Hazard,
                state: NoteState::Spawned, marked: false,
            }),
            Spawn::Obstacle { kind } => self.obstacles.push(Obstacle {
                id, kind, depth, hit: false, judged: false, marked: false,
            }),
        }
        trace!(?id, ?spawn, "spawned");
        id
    }

    /// Move everything one tick closer.  `score` drives the speed ramp.
    pub fn advance(&mut self, score: u64) -> Vec<LifecycleEvent> {
        let speed = self.config.speed_at(score);
        let mut events = Vec::new();

        for note in &mut self.notes {
            note.depth -= speed;
            if note.depth < self.config.near_bound {
                let to = if note.is_hazard() { NoteState::Expired } else { NoteState::Missed };
                if note.settle(to) {
                    events.push(match to {
                        NoteState::Missed => LifecycleEvent::Missed { id: note.id, lane: note.lane },
                        _                 => LifecycleEvent::Expired { id: note.id },
                    });
                }
            }
            if note.depth < self.config.remove_depth {
                note.marked = true;
            }
        }

        for ob in &mut self.obstacles {
            ob.depth -= speed;
            if !ob.judged && ob.depth <= 0.0 {
                ob.judged = true;
                events.push(LifecycleEvent::ObstacleArrived { id: ob.id, kind: ob.kind });
            }
            if ob.depth < self.config.remove_depth {
                ob.marked = true;
            }
        }
        events
    }

    pub fn is_hittable(&self, note: &Note) -> bool {
        note.state == NoteState::Spawned
            && note.depth >= self.config.near_bound
            && note.depth <= self.config.far_bound
    }

    /// Hittable notes, nearest first.
    pub fn hittable(&self) -> Vec<EntityId> {
        let mut ids: Vec<&Note> = self.notes.iter().filter(|n| self.is_hittable(n)).collect();
        ids.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        ids.into_iter().map(|n| n.id).collect()
    }

    pub fn note(&self, id: EntityId) -> Option<&Note> { self.notes.iter().find(|n| n.id == id) }

    /// Slice a hittable note.  Returns false if it was not hittable.
    pub fn mark_hit(&mut self, id: EntityId) -> bool {
        let (near, far) = (self.config.near_bound, self.config.far_bound);
        match self.notes.iter_mut().find(|n| n.id == id) {
            Some(n) if n.depth >= near && n.depth <= far => {
                let settled = n.settle(NoteState::Hit);
                if settled { n.marked = true; }
                settled
            }
            _ => false,
        }
    }

    pub fn mark_obstacle_hit(&mut self, id: EntityId) {
        if let Some(ob) = self.obstacles.iter_mut().find(|o| o.id == id) {
            ob.hit = true;
        }
    }

    /// Drop everything marked this tick.
    pub fn compact(&mut self) {
        self.notes.retain(|n| !n.marked);
        self.obstacles.retain(|o| !o.marked);
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.obstacles.clear();
    }

    pub fn notes(&self) -> &[Note] { &self.notes }
    pub fn obstacles(&self) -> &[Obstacle] { &self.obstacles }
    pub fn config(&self) -> &NoteConfig { &self.config }
    pub fn is_empty(&self) -> bool { self.notes.is_empty() && self.obstacles.is_empty() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
