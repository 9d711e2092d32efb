//! End-to-end play scenarios driven by a manual clock.

use std::sync::Arc;

use beat_midi::{AudioOutput, Direction, Lane, ObstacleKind, Spawn, TrackBuffer, VoiceEvent};
use pose_slicer::config::GameConfig;
use pose_slicer::gesture::SimBody;
use pose_slicer::judge::{judge_notes, Judgement};
use pose_slicer::notes::{NoteConfig, NoteLifecycleManager};
use pose_slicer::score::{Scoreboard, ScoringConfig};
use pose_slicer::session::FinishReason;
use pose_slicer::{GameSession, SessionEvent, SessionPhase, SessionTrack};
use pose_stream::landmark::{LEFT_WRIST, RIGHT_WRIST};
use pose_stream::{Hand, Landmark, PoseFrame, PoseSignalProcessor, SmoothingConfig};

// ── Harness ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct ManualAudio {
    now:       f64,
    scheduled: usize,
    stops:     usize,
}

impl AudioOutput for ManualAudio {
    fn now(&self) -> f64 { self.now }
    fn schedule(&mut self, _at: f64, _e: VoiceEvent) { self.scheduled += 1; }
    fn play_track(&mut self, _t: Arc<TrackBuffer>) {}
    fn stop_all(&mut self) { self.stops += 1; }
    fn low_band_energy(&self) -> Option<f32> { None }
    fn track_position(&self) -> Option<f64> { None }
}

const SIM_DT: f64 = 1.0 / 60.0;

/// Run the session the way the app loop does: scheduler every period,
/// simulation every frame.  Stops at `limit` seconds or when it finishes.
fn play(
    session: &mut GameSession,
    audio:   &mut ManualAudio,
    frame:   Option<&PoseFrame>,
    limit:   f64,
) -> Vec<SessionEvent> {
    let mut pose = PoseSignalProcessor::new(SmoothingConfig::default());
    let period = session.config().scheduler.period;
    let mut next_sched = audio.now;
    let mut events = Vec::new();

    while audio.now < limit && session.is_playing() {
        if audio.now >= next_sched {
            session.scheduler_tick(audio);
            next_sched = audio.now + period;
        }
        pose.process(frame);
        events.extend(session.simulation_tick(&pose, audio));
        audio.now += SIM_DT;
    }
    events
}

fn quiet_config() -> GameConfig {
    let mut c = GameConfig::default();
    c.scheduler.seed = Some(11);
    c.scheduler.obstacle_chance = 0.0;
    c
}

/// Both wrists at one screen point, as a mirrored camera frame.
fn hands_at(x: f32, y: f32) -> PoseFrame {
    let mut f = PoseFrame::empty(0.0);
    f.set(LEFT_WRIST,  Landmark::new(1.0 - x, y, 1.0));
    f.set(RIGHT_WRIST, Landmark::new(1.0 - x, y, 1.0));
    f
}

// ── Scenario A: nobody in front of the camera ────────────────────────────

#[test]
fn unattended_notes_are_missed_and_drain_energy() {
    let mut c = quiet_config();
    c.session.session_seconds = 4.0;
    let mut session = GameSession::new(c);
    let mut audio = ManualAudio::default();
    session.start(SessionTrack::Synth { bpm: 120.0 }, &mut audio);

    let events = play(&mut session, &mut audio, None, 10.0);

    let board = session.scoreboard();
    assert!(board.misses() > 0);
    assert_eq!(board.combo(), 0);
    assert_eq!(board.max_combo(), 0);
    assert_eq!(board.energy() as u32, 100u32.saturating_sub(10 * board.misses()));
    assert!(audio.scheduled > 0);

    match events.last() {
        Some(SessionEvent::Finished { reason, score, .. }) => {
            assert_eq!(*reason, FinishReason::TimeUp);
            assert_eq!(*score, 0);
        }
        other => panic!("expected finish, got {:?}", other),
    }
    assert!(matches!(session.phase(), SessionPhase::Finished { .. }));
}

#[test]
fn unattended_session_ends_when_energy_runs_out() {
    let mut session = GameSession::new(quiet_config());
    let mut audio = ManualAudio::default();
    session.start(SessionTrack::Synth { bpm: 120.0 }, &mut audio);

    let events = play(&mut session, &mut audio, None, 60.0);

    assert_eq!(session.scoreboard().energy(), 0);
    assert_eq!(session.scoreboard().misses(), 10);
    assert!(matches!(
        events.last(),
        Some(SessionEvent::Finished { reason: FinishReason::EnergyDepleted, .. })
    ));
    assert!(audio.now < 60.0);
    assert!(audio.stops >= 2);
}

// ── Scenario B: the right hand on the right note ─────────────────────────

#[test]
fn left_hand_slices_note_in_its_lane() {
    let cfg = GameConfig::default();
    let mut notes = NoteLifecycleManager::new(NoteConfig { spawn_depth: 2.0, ..NoteConfig::default() });
    let mut board = Scoreboard::new(ScoringConfig::default());

    // Knock energy down first so the hit bonus shows.
    board.miss();
    assert_eq!(board.energy(), 90);

    let id = notes.spawn(Spawn::Note { lane: Lane::new(2, 0), hand: Hand::Left, direction: Direction::Up });
    board.register_note();
    notes.advance(0);

    let mut pose = PoseSignalProcessor::default();
    let mut frame = PoseFrame::empty(0.0);
    frame.set(LEFT_WRIST, Landmark::new(1.0 - 0.6, 0.3, 1.0));
    pose.process(Some(&frame));

    let judged = judge_notes(&cfg.judge, &mut notes, &pose);
    assert_eq!(judged.len(), 1);
    match judged[0] {
        Judgement::Hit { id: hit, hand, .. } => {
            assert_eq!(hit, id);
            assert_eq!(hand, Hand::Left);
        }
        other => panic!("expected hit, got {:?}", other),
    }

    let points = board.hit(1.0);
    assert_eq!(points, 100);
    assert_eq!(board.score(), 100);
    assert_eq!(board.combo(), 1);
    assert_eq!(board.energy(), 92);

    // Hitting again from full never overflows the bar.
    let mut full = Scoreboard::new(ScoringConfig::default());
    full.hit(1.0);
    assert_eq!(full.energy(), 100);
}

/// The left wrist alone at one screen point.
fn left_hand_at(x: f32, y: f32) -> PoseFrame {
    let mut f = PoseFrame::empty(0.0);
    f.set(LEFT_WRIST, Landmark::new(1.0 - x, y, 1.0));
    f
}

#[test]
fn session_slices_a_note_at_base_value() {
    let mut c = quiet_config();
    c.scoring.miss_penalty = 0;
    let mut session = GameSession::new(c);
    let mut audio = ManualAudio::default();
    session.start(SessionTrack::Synth { bpm: 120.0 }, &mut audio);

    // The stock groove opens with a left-hand note in lane (1, 1).
    let frame = left_hand_at(0.4, 0.5);
    let events = play(&mut session, &mut audio, Some(&frame), 10.0);

    let first = events.iter()
        .position(|e| matches!(e, SessionEvent::Sliced { .. }))
        .expect("the left hand sliced a note");
    assert!(events[..first].iter().all(|e| !matches!(e, SessionEvent::Missed { .. } | SessionEvent::HazardHit { .. })));
    match &events[first] {
        SessionEvent::Sliced { hand, points, position, .. } => {
            assert_eq!(*hand, Hand::Left);
            assert_eq!(*points, 100);
            assert!(position.distance(pose_stream::Vec2::new(0.4, 0.5)) < 1e-4);
        }
        other => panic!("expected slice, got {:?}", other),
    }

    let board = session.scoreboard();
    assert!(board.hit_notes() >= 1);
    assert!(board.max_combo() >= 1);
    assert!(board.score() >= 100);
    assert_eq!(board.energy(), 100);
}

#[test]
fn overdrive_doubles_slice_points() {
    let mut c = quiet_config();
    c.scoring.miss_penalty = 0;
    c.overdrive.trigger_combo = 1;
    c.overdrive.boost = 2.0;
    c.overdrive.active_secs = 30.0;
    let mut session = GameSession::new(c);
    let mut audio = ManualAudio::default();
    session.start(SessionTrack::Synth { bpm: 120.0 }, &mut audio);

    let frame = left_hand_at(0.4, 0.5);
    let events = play(&mut session, &mut audio, Some(&frame), 10.0);

    let started = events.iter()
        .position(|e| matches!(e, SessionEvent::OverdriveStarted))
        .expect("overdrive started after the first slice");
    let before: Vec<u64> = events[..started].iter()
        .filter_map(|e| match e { SessionEvent::Sliced { points, .. } => Some(*points), _ => None })
        .collect();
    let after: Vec<u64> = events[started..].iter()
        .filter_map(|e| match e { SessionEvent::Sliced { points, .. } => Some(*points), _ => None })
        .collect();

    assert_eq!(before, vec![100]);
    assert!(!after.is_empty(), "no slice while overdrive was active");
    assert!(after.iter().all(|&p| p == 200), "boosted points {:?}", after);
    assert!(session.overdrive().is_active());
}

// ── Scenario C: hazard contact ───────────────────────────────────────────

#[test]
fn hazard_contact_costs_energy_and_breaks_combo() {
    let cfg = GameConfig::default();
    let mut notes = NoteLifecycleManager::new(NoteConfig { spawn_depth: 2.0, ..NoteConfig::default() });
    let mut board = Scoreboard::new(ScoringConfig::default());
    board.register_note();
    board.hit(1.0);
    assert_eq!(board.combo(), 1);

    notes.spawn(Spawn::Hazard { lane: Lane::new(1, 2) });
    notes.advance(0);

    // Either hand counts; use the right one this time.
    let mut pose = PoseSignalProcessor::default();
    let mut frame = PoseFrame::empty(0.0);
    frame.set(RIGHT_WRIST, Landmark::new(1.0 - 0.4, 0.7, 1.0));
    pose.process(Some(&frame));

    let judged = judge_notes(&cfg.judge, &mut notes, &pose);
    assert!(matches!(judged.as_slice(), [Judgement::HazardHit { hand: Hand::Right, .. }]));

    let depleted = board.hazard();
    assert!(!depleted);
    assert_eq!(board.energy(), 75);
    assert_eq!(board.combo(), 0);
    assert_eq!(board.hazards_hit(), 1);
}

#[test]
fn hazard_that_empties_energy_finishes_the_session() {
    let mut c = quiet_config();
    c.scoring.starting_energy = 25;
    c.scoring.miss_penalty = 0;
    let mut session = GameSession::new(c);
    let mut audio = ManualAudio::default();
    session.start(SessionTrack::Synth { bpm: 120.0 }, &mut audio);

    // Park both hands on the hazard lane of the stock groove.
    let frame = hands_at(0.4, 0.7);
    let events = play(&mut session, &mut audio, Some(&frame), 20.0);

    let hazard_at = events.iter()
        .position(|e| matches!(e, SessionEvent::HazardHit { .. }))
        .expect("hazard reached the hands");
    assert!(matches!(
        events.get(hazard_at + 1),
        Some(SessionEvent::Finished { reason: FinishReason::EnergyDepleted, .. })
    ));
    assert_eq!(session.scoreboard().energy(), 0);
    assert_eq!(session.scoreboard().combo(), 0);
}

// ── Scenario D: standing still into an obstacle ──────────────────────────

#[test]
fn obstacle_that_empties_energy_finishes_the_session() {
    let mut c = quiet_config();
    c.scheduler.obstacle_chance = 1.0;
    c.scoring.starting_energy = 15;
    c.scoring.miss_penalty = 0;
    let mut session = GameSession::new(c);
    let mut audio = ManualAudio::default();
    session.start(SessionTrack::Synth { bpm: 120.0 }, &mut audio);

    // Upright and centred with hands low: every obstacle kind connects.
    let frame = SimBody::default().frame(0.0);
    let events = play(&mut session, &mut audio, Some(&frame), 20.0);

    let hit_at = events.iter()
        .position(|e| matches!(e, SessionEvent::ObstacleHit { .. }))
        .expect("an obstacle reached the body");
    assert!(matches!(
        events[hit_at],
        SessionEvent::ObstacleHit { kind: ObstacleKind::LowBar | ObstacleKind::LeftWall | ObstacleKind::RightWall }
    ));
    assert!(matches!(
        events.get(hit_at + 1),
        Some(SessionEvent::Finished { reason: FinishReason::EnergyDepleted, .. })
    ));
    assert_eq!(events.len(), hit_at + 2);

    let board = session.scoreboard();
    assert_eq!(board.energy(), 0);
    assert_eq!(board.obstacles_hit(), 1);
    assert!(matches!(session.phase(), SessionPhase::Finished { .. }));
    assert!(audio.stops >= 2);
}
