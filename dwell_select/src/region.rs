//! Rectangular hover regions in normalized screen space.

use pose_stream::Vec2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Region {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self { Region { x, y, w, h } }

    /// Half-open: the right and bottom edges belong to the neighbour.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x < self.x + self.w && p.y >= self.y && p.y < self.y + self.h
    }

    pub fn center(&self) -> Vec2 { Vec2::new(self.x + self.w * 0.5, self.y + self.h * 0.5) }
}

/// The first target whose region contains `p`.
pub fn pick<T: Clone>(regions: &[(T, Region)], p: Vec2) -> Option<T> {
    regions.iter().find(|(_, r)| r.contains(p)).map(|(t, _)| t.clone())
}
