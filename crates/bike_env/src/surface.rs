use log::debug;

/// Linear RGB in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const SUCCESS: Color = Color { r: 0.1, g: 0.5, b: 0.1 };
    pub const FAILURE: Color = Color { r: 0.5, g: 0.1, b: 0.1 };
    pub const CHECKPOINT: Color = Color { r: 0.1, g: 0.1, b: 0.5 };
}

/// Cosmetic hook for recolouring the ground on episode events.
pub trait GroundPainter {
    fn paint(&mut self, color: Color);
}

/// Painter that only logs the request.
#[derive(Debug, Default)]
pub struct LogPainter;

impl GroundPainter for LogPainter {
    fn paint(&mut self, color: Color) {
        debug!("ground colour -> ({:.1}, {:.1}, {:.1})", color.r, color.g, color.b);
    }
}
