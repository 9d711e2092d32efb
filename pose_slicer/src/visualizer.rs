//! Software-rendered visualizer using `minifb`.
//!
//! Layout while playing:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ SCORE 1234   COMBO 12 x2    [energy ████████░░]    0:42  OD  │
//! │                                                              │
//! │                 notes fly out of the vanishing               │
//! │                 point toward the 4×3 lane grid               │
//! │                                                              │
//! │        (L)  hand cursors with trails  (R)                    │
//! │ status bar                                                   │
//! │ key legend                                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything is drawn from a [`RenderSnapshot`]; the window only feeds
//! pointer and key input back as [`SimInput`]s.

use std::sync::mpsc::Sender;

use beat_midi::{Direction, Lane, ObstacleKind, LANE_COLUMNS, LANE_ROWS};
use minifb::{Key, KeyRepeat, MouseMode, Window, WindowOptions};
use pose_stream::Vec2;

use crate::gesture::{SimInput, SimKey};
use crate::hud::{
    energy_color, grade_color, hand_color, ButtonView, HandView, HudView, NoteView,
    ObstacleView, RenderSnapshot, Screen, GOLD, OBSTACLE_COLOR, VANISHING_POINT,
};
use crate::notes::lane_position;
use crate::score::Grade;
use crate::Error;

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:      usize = 960;
pub const WIN_H:      usize = 720;
const HUD_H:          usize = 40;
const STATUS_Y:       usize = WIN_H - 40;
const BG_COLOR:       u32   = 0xFF10101E;
const HUD_BG:         u32   = 0xFF16213E;
const TEXT_BG:        u32   = 0xFF0F3460;
const GRID_COLOR:     u32   = 0xFF2A2A48;
const TEXT_COLOR:     u32   = 0xFFEEEEEE;
const DIM_TEXT:       u32   = 0xFF888888;
const ERROR_COLOR:    u32   = 0xFFFF5050;
const DAMAGE_COLOR:   u32   = 0xFFFF0000;

/// What the main loop should do after polling the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputAction { None, Abort, Quit }

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window:      Window,
    buf:         Vec<u32>,
    sim_tx:      Sender<SimInput>,
    last_cursor: Option<(f32, f32, bool)>,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>) -> crate::Result<Self> {
        let mut window = Window::new(
            "Pose Slicer",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| Error::Window(e.to_string()))?;

        // Frames are paced by the ticker.
        window.limit_update_rate(None);

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            sim_tx,
            last_cursor: None,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Translate mouse and keys into simulated pose input.  Send failures
    /// are ignored: with a real pose feed nobody listens.
    pub fn poll_input(&mut self) -> InputAction {
        if !self.window.is_open() { return InputAction::Quit; }

        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        if one_shot(Key::Q)      { return InputAction::Quit; }
        let abort = one_shot(Key::Escape);
        let hide  = one_shot(Key::H);

        let mut inputs = Vec::new();
        for (key, sim) in [(Key::C, SimKey::Duck), (Key::Z, SimKey::LeanLeft), (Key::X, SimKey::LeanRight)] {
            if self.window.is_key_pressed(key, KeyRepeat::No) { inputs.push(SimInput::KeyDown(sim)); }
            if self.window.is_key_released(key)               { inputs.push(SimInput::KeyUp(sim)); }
        }
        if hide { inputs.push(SimInput::KeyDown(SimKey::HideHands)); }

        let shift = self.window.is_key_down(Key::LeftShift)
                 || self.window.is_key_down(Key::RightShift);
        if let Some((mx, my)) = self.window.get_mouse_pos(MouseMode::Clamp) {
            let cursor = (mx / WIN_W as f32, my / WIN_H as f32, shift);
            if self.last_cursor != Some(cursor) {
                self.last_cursor = Some(cursor);
                inputs.push(SimInput::Pointer { x: cursor.0, y: cursor.1, left: shift });
            }
        }

        for input in inputs {
            let _ = self.sim_tx.send(input);
        }
        if abort { InputAction::Abort } else { InputAction::None }
    }

    /// Render one frame.
    pub fn render(&mut self, snap: &RenderSnapshot) -> crate::Result<()> {
        self.buf.fill(BG_COLOR);

        match &snap.screen {
            Screen::Menu { buttons, error } => {
                self.draw_label_scaled("POSE SLICER", WIN_W / 2 - 11 * 12 / 2, 50, 3, GOLD);
                self.draw_buttons(buttons);
                if let Some(e) = error {
                    self.draw_label_scaled(e, 20, STATUS_Y - 30, 2, ERROR_COLOR);
                }
            }
            Screen::Playing { notes, obstacles, hud } => {
                self.draw_lane_grid();
                for o in obstacles { self.draw_obstacle(o); }
                for n in notes { self.draw_note(n); }
                self.draw_hud(hud);
            }
            Screen::Results { score, grade, accuracy, max_combo, best, buttons } => {
                self.draw_results(*score, *grade, *accuracy, *max_combo, *best);
                self.draw_buttons(buttons);
            }
        }

        for f in &snap.flashes {
            let color = blend(f.color, BG_COLOR, f.progress);
            let len = 0.06 + 0.08 * f.progress;
            let d = Vec2::new(f.angle.cos(), f.angle.sin()) * len;
            self.draw_line(to_px(f.position - d), to_px(f.position + d), 3, color);
        }
        for p in &snap.popups {
            let (x, y) = to_px(p.position);
            let w = p.text.chars().count() as isize * 8;
            self.draw_label_at(&p.text, x - w / 2, y, 2, blend(p.color, BG_COLOR, p.progress));
        }
        for h in &snap.hands { self.draw_hand(h); }
        if snap.damage > 0.0 { self.draw_damage(snap.damage); }

        // ── Status bar ────────────────────────────────────────────────────
        self.fill_rect(0, STATUS_Y, WIN_W, WIN_H - STATUS_Y, TEXT_BG);
        self.draw_label(&snap.status, 10, STATUS_Y + 8, TEXT_COLOR);
        self.draw_label(
            "mouse=right hand  shift+mouse=left hand  C=duck  Z/X=lean  H=hide hands  Esc=menu  Q=quit",
            10, WIN_H - 14, DIM_TEXT,
        );

        self.window.update_with_buffer(&self.buf, WIN_W, WIN_H)
            .map_err(|e| Error::Window(e.to_string()))
    }

    // ── Menus ─────────────────────────────────────────────────────────────

    fn draw_buttons(&mut self, buttons: &[ButtonView]) {
        for b in buttons {
            let (x, y) = to_px(Vec2::new(b.region.x, b.region.y));
            let (x, y) = (x.max(0) as usize, y.max(0) as usize);
            let w = (b.region.w * WIN_W as f32) as usize;
            let h = (b.region.h * WIN_H as f32) as usize;

            self.fill_rect(x, y, w, h, TEXT_BG);
            let filled = (w as f32 * (b.progress / 100.0).clamp(0.0, 1.0)) as usize;
            self.fill_rect(x, y, filled, h, blend(TEXT_BG, GOLD, 0.5));
            self.draw_border(x, y, w, h, if b.progress > 0.0 { GOLD } else { GRID_COLOR });

            let label_w = b.label.chars().count() * 8;
            self.draw_label_scaled(&b.label, x + w.saturating_sub(label_w) / 2, y + h / 2 - 5, 2, TEXT_COLOR);
        }
    }

    fn draw_results(&mut self, score: u64, grade: Grade, accuracy: f64, max_combo: u32, best: Option<u64>) {
        let cx = WIN_W / 2;
        self.draw_label_scaled("RESULTS", cx - 7 * 12 / 2, 40, 3, TEXT_COLOR);
        let g = grade.label();
        self.draw_label_scaled(g, cx - g.len() * 32 / 2, 110, 8, grade_color(grade));

        let lines = [
            format!("SCORE {}", score),
            format!("ACCURACY {:.1}%", accuracy * 100.0),
            format!("MAX COMBO {}", max_combo),
            format!("BEST {}", best.map_or("-".to_string(), |b| b.to_string())),
        ];
        for (i, line) in lines.iter().enumerate() {
            let w = line.chars().count() * 8;
            self.draw_label_scaled(line, cx - w / 2, 190 + i * 26, 2, TEXT_COLOR);
        }
    }

    // ── Playfield ─────────────────────────────────────────────────────────

    fn draw_lane_grid(&mut self) {
        for y in 0..LANE_ROWS {
            for x in 0..LANE_COLUMNS {
                let (px, py) = to_px(lane_position(Lane::new(x, y)));
                self.draw_ring(px, py, 6, 1, GRID_COLOR);
            }
        }
        let (vx, vy) = to_px(VANISHING_POINT);
        self.draw_diamond(vx.max(0) as usize, vy.max(0) as usize, 3, GRID_COLOR);
    }

    fn draw_note(&mut self, n: &NoteView) {
        let (cx, cy) = to_px(n.position);
        let r = (n.radius * WIN_H as f32).max(2.0) as isize;
        self.fill_circle(cx, cy, r, n.color);
        if n.hazard {
            self.draw_line((cx - r / 2, cy - r / 2), (cx + r / 2, cy + r / 2), 2, 0xFFFF4040);
            self.draw_line((cx - r / 2, cy + r / 2), (cx + r / 2, cy - r / 2), 2, 0xFFFF4040);
        }
        if let Some(d) = n.direction {
            let (dx, dy) = direction_vector(d);
            let tip = (cx + dx * r * 2 / 3, cy + dy * r * 2 / 3);
            self.draw_line((cx, cy), tip, 2, 0xFFFFFFFF);
        }
        if n.hittable {
            self.draw_ring(cx, cy, r + 3, 2, 0xFFFFFFFF);
        }
    }

    fn draw_obstacle(&mut self, o: &ObstacleView) {
        let (min, max) = obstacle_rect(o.kind);
        let shrink = |p: Vec2| to_px(VANISHING_POINT + (p - VANISHING_POINT) * o.scale);
        let (x0, y0) = shrink(min);
        let (x1, y1) = shrink(max);
        let (x0, y0) = (x0.max(0) as usize, y0.max(0) as usize);
        let (x1, y1) = (x1.max(0) as usize, y1.max(0) as usize);
        let alpha = 0.15 + 0.35 * o.scale;
        self.tint_rect(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0), OBSTACLE_COLOR, alpha);
        self.draw_border(x0, y0, x1.saturating_sub(x0).max(1), y1.saturating_sub(y0).max(1), OBSTACLE_COLOR);
    }

    fn draw_hand(&mut self, h: &HandView) {
        if !h.tracked { return; }
        let color = hand_color(h.hand);
        let n = h.trail.len().max(1);
        for (i, p) in h.trail.iter().enumerate() {
            let (x, y) = to_px(*p);
            let fade = 1.0 - (i + 1) as f32 / n as f32;
            self.fill_circle(x, y, 3, blend(color, BG_COLOR, fade));
        }
        let (x, y) = to_px(h.position);
        self.draw_ring(x, y, 14, 3, color);
    }

    fn draw_damage(&mut self, amount: f32) {
        let t = (amount * 0.6).clamp(0.0, 1.0);
        let edge = 14;
        self.tint_rect(0, 0, WIN_W, edge, DAMAGE_COLOR, t);
        self.tint_rect(0, STATUS_Y - edge, WIN_W, edge, DAMAGE_COLOR, t);
        self.tint_rect(0, 0, edge, STATUS_Y, DAMAGE_COLOR, t);
        self.tint_rect(WIN_W - edge, 0, edge, STATUS_Y, DAMAGE_COLOR, t);
    }

    // ── HUD ───────────────────────────────────────────────────────────────

    fn draw_hud(&mut self, hud: &HudView) {
        self.fill_rect(0, 0, WIN_W, HUD_H, HUD_BG);
        self.draw_label_scaled(&format!("SCORE {}", hud.score), 12, 12, 3, TEXT_COLOR);
        self.draw_label_scaled(&format!("COMBO {} x{}", hud.combo, hud.multiplier), 260, 14, 2, TEXT_COLOR);

        // Energy bar
        let (bx, bw) = (470, 220);
        self.fill_rect(bx, 12, bw, 16, 0xFF202020);
        let fill = bw * hud.energy.min(100) as usize / 100;
        self.fill_rect(bx, 12, fill, 16, energy_color(hud.energy));
        self.draw_border(bx, 12, bw, 16, DIM_TEXT);

        let secs = hud.remaining.ceil() as u64;
        self.draw_label_scaled(&format!("{}:{:02}", secs / 60, secs % 60), 720, 12, 3, TEXT_COLOR);

        // Overdrive meter
        let od = hud.overdrive;
        let (ox, ow) = (820, 120);
        let color = if od.active { GOLD } else if od.ready { 0xFF7CFC00 } else { DIM_TEXT };
        let level = if od.ready { 1.0 } else { od.fraction };
        self.fill_rect(ox, 14, (ow as f32 * level) as usize, 12, color);
        self.draw_border(ox, 14, ow, 12, color);
        self.draw_label("OVERDRIVE", ox + 2, 30, color);
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y+h).min(WIN_H) {
            for col in x..(x+w).min(WIN_W) {
                self.buf[row * WIN_W + col] = color;
            }
        }
    }

    /// Blend `color` over whatever is already drawn.
    fn tint_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32, alpha: f32) {
        for row in y..(y+h).min(WIN_H) {
            for col in x..(x+w).min(WIN_W) {
                let i = row * WIN_W + col;
                self.buf[i] = blend(self.buf[i], color, alpha);
            }
        }
    }

    fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        for col in x..(x+w).min(WIN_W) {
            if y < WIN_H           { self.buf[y           * WIN_W + col] = color; }
            if y+h-1 < WIN_H       { self.buf[(y+h-1)     * WIN_W + col] = color; }
        }
        for row in y..(y+h).min(WIN_H) {
            if x < WIN_W           { self.buf[row * WIN_W + x    ] = color; }
            if x+w-1 < WIN_W       { self.buf[row * WIN_W + x+w-1] = color; }
        }
    }

    fn set_pixel(&mut self, x: isize, y: isize, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < WIN_W && (y as usize) < WIN_H {
            self.buf[y as usize * WIN_W + x as usize] = color;
        }
    }

    fn fill_circle(&mut self, cx: isize, cy: isize, r: isize, color: u32) {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn draw_ring(&mut self, cx: isize, cy: isize, r: isize, thickness: isize, color: u32) {
        let inner = (r - thickness).max(0);
        for dy in -r..=r {
            for dx in -r..=r {
                let d2 = dx * dx + dy * dy;
                if d2 <= r * r && d2 > inner * inner {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn draw_line(&mut self, from: (isize, isize), to: (isize, isize), thickness: isize, color: u32) {
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).max(1);
        let half = thickness / 2;
        for i in 0..=steps {
            let x = from.0 + (to.0 - from.0) * i / steps;
            let y = from.1 + (to.1 - from.1) * i / steps;
            for oy in -half..=half {
                for ox in -half..=half {
                    self.set_pixel(x + ox, y + oy, color);
                }
            }
        }
    }

    fn draw_diamond(&mut self, cx: usize, cy: usize, r: usize, color: u32) {
        for dy in 0..=r as isize {
            let dx = r as isize - dy;
            for &(sx, sy) in &[
                (cx as isize + dx, cy as isize + dy),
                (cx as isize - dx, cy as isize + dy),
                (cx as isize + dx, cy as isize - dy),
                (cx as isize - dx, cy as isize - dy),
            ] {
                self.set_pixel(sx, sy, color);
            }
        }
    }

    fn draw_label(&mut self, text: &str, x: usize, y: usize, color: u32) {
        self.draw_label_at(text, x as isize, y as isize, 1, color);
    }

    fn draw_label_scaled(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        self.draw_label_at(text, x as isize, y as isize, scale, color);
    }

    /// Minimal bitmap font, 3×5 glyphs blown up by `scale`.
    fn draw_label_at(&mut self, text: &str, x: isize, y: isize, scale: usize, color: u32) {
        let s = scale.max(1) as isize;
        let mut cx = x;
        for ch in text.chars() {
            let bits = glyph_bits(ch);
            for i in 0..15isize {
                if bits & (1 << (14 - i)) == 0 { continue; }
                let (row, col) = (i / 3, i % 3);
                for py in 0..s {
                    for px in 0..s {
                        self.set_pixel(cx + col * s + px, y + row * s + py, color);
                    }
                }
            }
            cx += 4 * s;
            if cx + 4 * s > WIN_W as isize { break; }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

fn to_px(p: Vec2) -> (isize, isize) {
    ((p.x * WIN_W as f32) as isize, (p.y * WIN_H as f32) as isize)
}

fn direction_vector(d: Direction) -> (isize, isize) {
    match d {
        Direction::Up    => (0, -1),
        Direction::Down  => (0, 1),
        Direction::Left  => (-1, 0),
        Direction::Right => (1, 0),
    }
}

/// Screen rectangle an obstacle covers when it reaches the player.
fn obstacle_rect(kind: ObstacleKind) -> (Vec2, Vec2) {
    match kind {
        ObstacleKind::LowBar    => (Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.4)),
        ObstacleKind::LeftWall  => (Vec2::new(0.0, 0.0), Vec2::new(0.5, 1.0)),
        ObstacleKind::RightWall => (Vec2::new(0.5, 0.0), Vec2::new(1.0, 1.0)),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bitmap font
// ────────────────────────────────────────────────────────────────────────────

/// 3×5 glyph, rows top to bottom packed into 15 bits (MSB first).
fn glyph_bits(c: char) -> u16 {
    match c.to_ascii_uppercase() {
        '0' => 0b111_101_101_101_111,
        '1' => 0b010_110_010_010_111,
        '2' => 0b111_001_111_100_111,
        '3' => 0b111_001_111_001_111,
        '4' => 0b101_101_111_001_001,
        '5' => 0b111_100_111_001_111,
        '6' => 0b111_100_111_101_111,
        '7' => 0b111_001_001_001_001,
        '8' => 0b111_101_111_101_111,
        '9' => 0b111_101_111_001_111,
        'A' => 0b111_101_111_101_101,
        'B' => 0b110_101_110_101_110,
        'C' => 0b111_100_100_100_111,
        'D' => 0b110_101_101_101_110,
        'E' => 0b111_100_111_100_111,
        'F' => 0b111_100_111_100_100,
        'G' => 0b111_100_101_101_111,
        'H' => 0b101_101_111_101_101,
        'I' => 0b111_010_010_010_111,
        'J' => 0b001_001_001_101_111,
        'K' => 0b101_101_110_101_101,
        'L' => 0b100_100_100_100_111,
        'M' => 0b101_111_101_101_101,
        'N' => 0b111_101_101_101_101,
        'O' => 0b111_101_101_101_111,
        'P' => 0b111_101_111_100_100,
        'Q' => 0b111_101_101_111_001,
        'R' => 0b110_101_110_101_101,
        'S' => 0b111_100_111_001_111,
        'T' => 0b111_010_010_010_010,
        'U' => 0b101_101_101_101_111,
        'V' => 0b101_101_101_010_010,
        'W' => 0b101_101_101_111_101,
        'X' => 0b101_101_010_101_101,
        'Y' => 0b101_101_111_010_010,
        'Z' => 0b111_001_010_100_111,
        '/' => 0b001_001_010_100_100,
        '-' => 0b000_000_111_000_000,
        '.' => 0b000_000_000_000_010,
        ',' => 0b000_000_000_010_100,
        ':' => 0b000_010_000_010_000,
        '=' => 0b000_111_000_111_000,
        '+' => 0b000_010_111_010_000,
        '!' => 0b010_010_010_000_010,
        '%' => 0b101_001_010_100_101,
        '(' => 0b001_010_010_010_001,
        ')' => 0b100_010_010_010_100,
        '<' => 0b001_010_100_010_001,
        '>' => 0b100_010_001_010_100,
        ' ' => 0b000_000_000_000_000,
        _   => 0b000_000_010_000_000,
    }
}

/// Alpha-blend two ARGB colors. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let channel = |shift: u32| {
        let (ca, cb) = ((a >> shift) & 0xFF, (b >> shift) & 0xFF);
        ((ca as f32 * (1.0 - t) + cb as f32 * t).round() as u32) << shift
    };
    0xFF000000 | channel(16) | channel(8) | channel(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 0.0), 0xFF000000);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
        assert_eq!(blend(0xFF102030, 0xFF102030, 0.5), 0xFF102030);
    }

    #[test]
    fn legend_characters_have_glyphs() {
        let fallback = glyph_bits('~');
        for c in "SCORE COMBO OVERDRIVE RESULTS ACCURACY 0123456789 % : + - ! Q".chars() {
            if c != ' ' {
                assert_ne!(glyph_bits(c), fallback, "missing glyph for {:?}", c);
            }
        }
        assert_eq!(glyph_bits('q'), glyph_bits('Q'));
    }

    #[test]
    fn walls_split_the_screen() {
        let (l0, l1) = obstacle_rect(ObstacleKind::LeftWall);
        let (r0, r1) = obstacle_rect(ObstacleKind::RightWall);
        assert_eq!(l1.x, r0.x);
        assert_eq!(l0.x, 0.0);
        assert_eq!(r1.x, 1.0);
    }

    #[test]
    fn normalized_corners_map_to_window() {
        assert_eq!(to_px(Vec2::new(0.0, 0.0)), (0, 0));
        assert_eq!(to_px(Vec2::new(1.0, 1.0)), (WIN_W as isize, WIN_H as isize));
    }
}
