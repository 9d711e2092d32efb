//! Top-level application state machine.
//!
//! `AppState` owns the pose processor, the [`GameSession`], the two dwell
//! menus and the on-screen effects.  `run` wires it to a pose feed, the
//! audio player, the window and the ticker that paces both cadences.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc;
use std::sync::Arc;

use beat_midi::AudioOutput;
use dwell_select::{pick, DualDwell, Region};
use pose_stream::{Hand, PoseFrame, PoseSignalProcessor, PoseSource};
use tracing::{info, warn};

use crate::cadence::{spawn_ticker, Tick};
use crate::config::{GameConfig, PoseFeedKind};
use crate::gesture::{spawn_pose_feed, FrameSlot, LinesPoseSource, SimInput, SimPoseSource};
use crate::hud::{self, ButtonView, Effects, HudView, OverdriveView, RenderSnapshot, Screen};
use crate::player::{decode_track, Player};
use crate::session::{GameSession, SessionEvent, SessionPhase, SessionTrack};
use crate::visualizer::{InputAction, Visualizer};

// ════════════════════════════════════════════════════════════════════════════
// Menu items
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackChoice { Easy, Normal, Hard, UserTrack }

impl TrackChoice {
    pub fn bpm(self) -> Option<f64> {
        match self {
            TrackChoice::Easy      => Some(100.0),
            TrackChoice::Normal    => Some(120.0),
            TrackChoice::Hard      => Some(140.0),
            TrackChoice::UserTrack => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrackChoice::Easy      => "EASY  100 BPM",
            TrackChoice::Normal    => "NORMAL  120 BPM",
            TrackChoice::Hard      => "HARD  140 BPM",
            TrackChoice::UserTrack => "YOUR TRACK",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultsChoice { Retry, Menu, Quit }

impl ResultsChoice {
    pub fn label(self) -> &'static str {
        match self {
            ResultsChoice::Retry => "RETRY",
            ResultsChoice::Menu  => "MENU",
            ResultsChoice::Quit  => "QUIT",
        }
    }
}

const RESULTS_MENU: [(ResultsChoice, Region); 3] = [
    (ResultsChoice::Retry, Region::new(0.08, 0.68, 0.24, 0.18)),
    (ResultsChoice::Menu,  Region::new(0.38, 0.68, 0.24, 0.18)),
    (ResultsChoice::Quit,  Region::new(0.68, 0.68, 0.24, 0.18)),
];

fn track_menu(with_user_track: bool) -> Vec<(TrackChoice, Region)> {
    let mut items = vec![TrackChoice::Easy, TrackChoice::Normal, TrackChoice::Hard];
    if with_user_track { items.push(TrackChoice::UserTrack); }
    items.into_iter()
        .enumerate()
        .map(|(i, c)| (c, Region::new(0.3, 0.18 + i as f32 * 0.17, 0.4, 0.13)))
        .collect()
}

fn buttons<T: Copy + PartialEq + std::fmt::Debug>(
    items: &[(T, Region)],
    dwell: &DualDwell<T>,
    label: impl Fn(T) -> &'static str,
) -> Vec<ButtonView> {
    items.iter()
        .map(|&(item, region)| {
            let progress = Hand::BOTH.into_iter()
                .map(|h| dwell.cursor(h))
                .filter(|c| c.candidate() == Some(&item))
                .map(|c| c.progress())
                .fold(0.0, f32::max);
            ButtonView { label: label(item).to_string(), region, progress }
        })
        .collect()
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppAction { Continue, Quit }

pub struct AppState {
    pose:          PoseSignalProcessor,
    session:       GameSession,
    track_menu:    Vec<(TrackChoice, Region)>,
    track_dwell:   DualDwell<TrackChoice>,
    results_dwell: DualDwell<ResultsChoice>,
    effects:       Effects,
    user_track:    Option<PathBuf>,
    last_track:    Option<SessionTrack>,
    error:         Option<String>,
    best:          Rc<Cell<Option<u64>>>,
}

impl AppState {
    pub fn new(config: GameConfig) -> Self {
        let user_track = config.session.user_track.clone();
        let dwell = config.session.dwell_secs;
        let best = Rc::new(Cell::new(None));

        let mut session = GameSession::new(config.clone());
        let sink = Rc::clone(&best);
        session.on_finish(move |score, _grade| {
            let prev: Option<u64> = sink.get();
            sink.set(Some(prev.map_or(score, |b| b.max(score))));
        });

        AppState {
            pose:          PoseSignalProcessor::new(config.smoothing.clone()),
            session,
            track_menu:    track_menu(user_track.is_some()),
            track_dwell:   DualDwell::new(dwell),
            results_dwell: DualDwell::new(dwell),
            effects:       Effects::default(),
            user_track,
            last_track:    None,
            error:         None,
            best,
        }
    }

    /// Hand positions this tick, `None` where the hand is lost.
    fn pointers(&self) -> (Option<pose_stream::Vec2>, Option<pose_stream::Vec2>) {
        (
            self.pose.hand(Hand::Left).map(|p| p.position()),
            self.pose.hand(Hand::Right).map(|p| p.position()),
        )
    }

    // ── per-frame ─────────────────────────────────────────────────────────

    /// One simulation tick: smooth the pose, then menu dwell or gameplay
    /// depending on the phase.
    pub fn frame(&mut self, frame: Option<&PoseFrame>, audio: &mut dyn AudioOutput) -> AppAction {
        self.pose.process(frame);
        let now = audio.now();
        let (l, r) = self.pointers();

        let action = match self.session.phase() {
            SessionPhase::Selecting => {
                let menu = &self.track_menu;
                let update = self.track_dwell.update(
                    l.and_then(|p| pick(menu, p)),
                    r.and_then(|p| pick(menu, p)),
                    now,
                );
                if let Some((hand, choice)) = update.committed {
                    info!(?hand, ?choice, "track selected");
                    self.choose(choice, audio);
                }
                AppAction::Continue
            }
            SessionPhase::Playing => {
                for event in self.session.simulation_tick(&self.pose, audio) {
                    self.effects.apply(&event);
                    if let SessionEvent::Finished { .. } = event {
                        self.results_dwell.reset();
                    }
                }
                AppAction::Continue
            }
            SessionPhase::Finished { .. } => {
                let update = self.results_dwell.update(
                    l.and_then(|p| pick(&RESULTS_MENU, p)),
                    r.and_then(|p| pick(&RESULTS_MENU, p)),
                    now,
                );
                match update.committed.map(|(_, c)| c) {
                    Some(ResultsChoice::Retry) => {
                        if let Some(track) = self.last_track.clone() {
                            self.effects.clear();
                            self.session.start(track, audio);
                        }
                        AppAction::Continue
                    }
                    Some(ResultsChoice::Menu) => {
                        self.back_to_menu(audio);
                        AppAction::Continue
                    }
                    Some(ResultsChoice::Quit) => AppAction::Quit,
                    None => AppAction::Continue,
                }
            }
        };
        self.effects.tick();
        action
    }

    /// Start a session on `choice`.  A track that fails to decode leaves
    /// the menu up with the error shown.
    pub fn choose(&mut self, choice: TrackChoice, audio: &mut dyn AudioOutput) {
        let track = match (choice.bpm(), &self.user_track) {
            (Some(bpm), _) => SessionTrack::Synth { bpm },
            (None, Some(path)) => match decode_track(path) {
                Ok(buffer) => SessionTrack::Recorded(Arc::new(buffer)),
                Err(e) => {
                    warn!(error = %e, "track unavailable");
                    self.error = Some(e.to_string());
                    self.track_dwell.reset();
                    return;
                }
            },
            (None, None) => return,
        };
        self.error = None;
        self.track_dwell.reset();
        self.effects.clear();
        self.session.start(track.clone(), audio);
        self.last_track = Some(track);
    }

    pub fn scheduler_tick(&mut self, audio: &mut dyn AudioOutput) {
        self.session.scheduler_tick(audio);
    }

    /// Abort play or leave the results screen.  Idempotent.
    pub fn back_to_menu(&mut self, audio: &mut dyn AudioOutput) {
        self.session.abort(audio);
        self.track_dwell.reset();
        self.results_dwell.reset();
        self.effects.clear();
    }

    // ── snapshot for the renderer ─────────────────────────────────────────

    pub fn snapshot(&self) -> RenderSnapshot {
        let screen = match self.session.phase() {
            SessionPhase::Selecting => Screen::Menu {
                buttons: buttons(&self.track_menu, &self.track_dwell, TrackChoice::label),
                error:   self.error.clone(),
            },
            SessionPhase::Playing => {
                let board = self.session.scoreboard();
                Screen::Playing {
                    notes:     hud::note_views(self.session.notes(), self.session.config().judge.note_size),
                    obstacles: hud::obstacle_views(self.session.notes()),
                    hud: HudView {
                        score:      board.score(),
                        combo:      board.combo(),
                        multiplier: board.config().combo_multiplier(board.combo()) * self.session.overdrive().boost(),
                        energy:     board.energy(),
                        remaining:  self.session.remaining(),
                        overdrive:  OverdriveView::of(self.session.overdrive(), self.session.elapsed()),
                    },
                }
            }
            SessionPhase::Finished { score, grade } => {
                let board = self.session.scoreboard();
                Screen::Results {
                    score,
                    grade,
                    accuracy:  board.accuracy(),
                    max_combo: board.max_combo(),
                    best:      self.best.get(),
                    buttons:   buttons(&RESULTS_MENU, &self.results_dwell, ResultsChoice::label),
                }
            }
        };

        let status = match self.session.phase() {
            SessionPhase::Selecting => "hover a hand over a track to start".to_string(),
            SessionPhase::Playing   => format!(
                "slice with the matching hand  -  hits {}/{}",
                self.session.scoreboard().hit_notes(),
                self.session.scoreboard().total_notes(),
            ),
            SessionPhase::Finished { .. } => "hover to choose".to_string(),
        };

        RenderSnapshot {
            screen,
            hands:   hud::hand_views(&self.pose),
            flashes: self.effects.flashes.clone(),
            popups:  self.effects.popups.clone(),
            damage:  self.effects.damage,
            status,
        }
    }

    pub fn session(&self) -> &GameSession { &self.session }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
}

// ════════════════════════════════════════════════════════════════════════════
// run() — the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application until the window closes or Quit is chosen.
///
/// The ticker sends scheduler ticks every `period` and frame ticks at
/// `sim_hz`.  Scheduler ticks are served as they arrive, including the
/// ones that queue up while a frame is drawn; frame ticks that pile up
/// behind a slow frame collapse into one.
pub fn run(config: GameConfig) -> crate::Result<()> {
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let rx = match config.session.pose_feed {
        PoseFeedKind::Sim   => spawn_pose_feed(SimPoseSource { rx: sim_rx, hz: config.session.sim_hz }),
        PoseFeedKind::Stdin => {
            drop(sim_rx);
            spawn_pose_feed(LinesPoseSource::stdin())
        }
    };
    let mut slot = FrameSlot::new(rx, config.session.stale_pose_ms);

    let mut vis   = Visualizer::new(sim_tx)?;
    let mut audio = Player::spawn(&config.audio);
    let ticks     = spawn_ticker(config.scheduler.period, 1.0 / config.session.sim_hz.max(1) as f64);
    let mut app   = AppState::new(config);

    while vis.is_open() {
        match ticks.recv() {
            Ok(Tick::Schedule) => {
                app.scheduler_tick(&mut audio);
                continue;
            }
            Ok(Tick::Frame) => {}
            Err(_) => break,
        }
        for tick in ticks.try_iter() {
            if tick == Tick::Schedule { app.scheduler_tick(&mut audio); }
        }

        match vis.poll_input() {
            InputAction::Quit  => break,
            InputAction::Abort => app.back_to_menu(&mut audio),
            InputAction::None  => {}
        }

        let frame = slot.detect(audio.now());
        if app.frame(frame.as_ref(), &mut audio) == AppAction::Quit {
            break;
        }
        vis.render(&app.snapshot())?;
    }

    app.back_to_menu(&mut audio);
    audio.stop_all();
    info!("bye");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use beat_midi::{TrackBuffer, VoiceEvent};
    use pose_stream::landmark::{LEFT_WRIST, RIGHT_WRIST};
    use pose_stream::{Landmark, Vec2};

    #[derive(Default)]
    struct FakeAudio { now: f64 }

    impl AudioOutput for FakeAudio {
        fn now(&self) -> f64 { self.now }
        fn schedule(&mut self, _at: f64, _e: VoiceEvent) {}
        fn play_track(&mut self, _t: Arc<TrackBuffer>) {}
        fn stop_all(&mut self) {}
        fn low_band_energy(&self) -> Option<f32> { None }
        fn track_position(&self) -> Option<f64> { None }
    }

    /// A frame showing the right hand at screen point `p`.
    fn right_at(p: Vec2) -> PoseFrame {
        let mut f = PoseFrame::empty(0.0);
        f.set(RIGHT_WRIST, Landmark::new(1.0 - p.x, p.y, 1.0));
        f
    }

    fn left_at(p: Vec2) -> PoseFrame {
        let mut f = PoseFrame::empty(0.0);
        f.set(LEFT_WRIST, Landmark::new(1.0 - p.x, p.y, 1.0));
        f
    }

    fn config() -> GameConfig {
        let mut c = GameConfig::default();
        c.scheduler.seed = Some(3);
        c
    }

    fn center_of<T: PartialEq>(items: &[(T, Region)], want: T) -> Vec2 {
        items.iter().find(|(t, _)| *t == want).map(|(_, r)| r.center()).unwrap()
    }

    /// Hover `frame` from `from` for long enough to commit.
    fn dwell(app: &mut AppState, audio: &mut FakeAudio, frame: &PoseFrame, from: f64) {
        for i in 0..=16 {
            audio.now = from + i as f64 * 0.1;
            app.frame(Some(frame), audio);
        }
    }

    #[test]
    fn dwelling_on_normal_starts_120_bpm() {
        let mut app = AppState::new(config());
        let mut audio = FakeAudio::default();
        let target = center_of(&app.track_menu, TrackChoice::Normal);
        dwell(&mut app, &mut audio, &right_at(target), 0.0);
        assert!(app.session().is_playing());
        assert_eq!(app.session().scheduler().unwrap().config().bpm, 120.0);
    }

    #[test]
    fn short_hover_does_not_start() {
        let mut app = AppState::new(config());
        let mut audio = FakeAudio::default();
        let f = right_at(center_of(&app.track_menu, TrackChoice::Hard));
        for i in 0..10 {
            audio.now = i as f64 * 0.1;
            app.frame(Some(&f), &mut audio);
        }
        assert_eq!(app.session().phase(), SessionPhase::Selecting);
        match app.snapshot().screen {
            Screen::Menu { buttons, .. } => {
                let hard = buttons.iter().find(|b| b.label.starts_with("HARD")).unwrap();
                assert!(hard.progress > 50.0 && hard.progress < 100.0);
            }
            other => panic!("expected menu, got {:?}", other),
        }
    }

    #[test]
    fn user_track_hidden_without_path() {
        let app = AppState::new(config());
        assert_eq!(app.track_menu.len(), 3);
    }

    #[test]
    fn bad_user_track_stays_in_menu_with_error() {
        let mut c = config();
        c.session.user_track = Some(PathBuf::from("/nonexistent/song.ogg"));
        let mut app = AppState::new(c);
        let mut audio = FakeAudio::default();
        let target = center_of(&app.track_menu, TrackChoice::UserTrack);
        dwell(&mut app, &mut audio, &left_at(target), 0.0);
        assert_eq!(app.session().phase(), SessionPhase::Selecting);
        assert!(app.error().is_some());
        assert!(matches!(app.snapshot().screen, Screen::Menu { error: Some(_), .. }));
    }

    fn finished_app() -> (AppState, FakeAudio) {
        let mut c = config();
        c.session.session_seconds = 0.5;
        let mut app = AppState::new(c);
        let mut audio = FakeAudio::default();
        app.choose(TrackChoice::Easy, &mut audio);
        audio.now = 1.0;
        app.frame(None, &mut audio);
        assert!(matches!(app.session().phase(), SessionPhase::Finished { .. }));
        (app, audio)
    }

    #[test]
    fn finish_records_best_score() {
        let (app, _) = finished_app();
        match app.snapshot().screen {
            Screen::Results { best, .. } => assert_eq!(best, Some(0)),
            other => panic!("expected results, got {:?}", other),
        }
    }

    #[test]
    fn results_retry_restarts_same_track() {
        let (mut app, mut audio) = finished_app();
        let f = right_at(RESULTS_MENU[0].1.center());
        dwell(&mut app, &mut audio, &f, 2.0);
        assert!(app.session().is_playing());
        assert_eq!(app.session().scheduler().unwrap().config().bpm, 100.0);
    }

    #[test]
    fn results_menu_returns_to_selecting() {
        let (mut app, mut audio) = finished_app();
        let f = right_at(RESULTS_MENU[1].1.center());
        dwell(&mut app, &mut audio, &f, 2.0);
        assert_eq!(app.session().phase(), SessionPhase::Selecting);
    }

    #[test]
    fn results_quit_asks_to_quit() {
        let (mut app, mut audio) = finished_app();
        let f = right_at(RESULTS_MENU[2].1.center());
        let mut quit = false;
        for i in 0..=16 {
            audio.now = 2.0 + i as f64 * 0.1;
            quit |= app.frame(Some(&f), &mut audio) == AppAction::Quit;
        }
        assert!(quit);
    }

    #[test]
    fn abort_is_safe_from_any_screen() {
        let mut app = AppState::new(config());
        let mut audio = FakeAudio::default();
        app.back_to_menu(&mut audio);
        app.choose(TrackChoice::Normal, &mut audio);
        app.back_to_menu(&mut audio);
        app.back_to_menu(&mut audio);
        assert_eq!(app.session().phase(), SessionPhase::Selecting);
    }

    #[test]
    fn playing_snapshot_has_hud() {
        let mut app = AppState::new(config());
        let mut audio = FakeAudio::default();
        app.choose(TrackChoice::Normal, &mut audio);
        app.frame(None, &mut audio);
        match app.snapshot().screen {
            Screen::Playing { hud, .. } => {
                assert_eq!(hud.energy, 100);
                assert_eq!(hud.multiplier, 1.0);
            }
            other => panic!("expected playing, got {:?}", other),
        }
    }
}
