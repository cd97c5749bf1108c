//! Drawing styles for hand landmarks, with MediaPipe's default hand colors.

use crate::image::{draw, AsImageViewMut, Color, ImageViewMut};

use super::landmark::{
    Connection, LandmarkIdx, HAND_CONNECTIONS, HAND_INDEX_FINGER_CONNECTIONS,
    HAND_MIDDLE_FINGER_CONNECTIONS, HAND_PALM_CONNECTIONS, HAND_PINKY_FINGER_CONNECTIONS,
    HAND_RING_FINGER_CONNECTIONS, HAND_THUMB_CONNECTIONS,
};
use super::model::HandLandmarks;

pub mod palette {
    use crate::image::Color;

    pub const RED: Color = Color::from_rgb8(255, 48, 48);
    pub const GREEN: Color = Color::from_rgb8(48, 255, 48);
    pub const BLUE: Color = Color::from_rgb8(21, 101, 192);
    pub const YELLOW: Color = Color::from_rgb8(255, 204, 0);
    pub const GRAY: Color = Color::from_rgb8(128, 128, 128);
    pub const PURPLE: Color = Color::from_rgb8(128, 64, 128);
    pub const PEACH: Color = Color::from_rgb8(255, 229, 180);
    pub const WHITE: Color = Color::from_rgb8(224, 224, 224);
}

/// Line thickness of a shape, or a filled shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Width(u32),
    Filled,
}

impl Stroke {
    fn line_width(self) -> u32 {
        match self {
            Stroke::Width(width) => width,
            Stroke::Filled => 1,
        }
    }
}

/// How to draw a single landmark or connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawingSpec {
    pub color: Color,
    pub thickness: Stroke,
    pub circle_radius: u32,
}

impl Default for DrawingSpec {
    fn default() -> Self {
        Self {
            color: palette::WHITE,
            thickness: Stroke::Width(2),
            circle_radius: 2,
        }
    }
}

impl DrawingSpec {
    pub const fn new(color: Color, thickness: Stroke, circle_radius: u32) -> Self {
        Self {
            color,
            thickness,
            circle_radius,
        }
    }
}

/// Per-landmark drawing specs.
#[derive(Debug, Clone)]
pub struct LandmarkStyle {
    specs: Vec<(usize, DrawingSpec)>,
    fallback: DrawingSpec,
}

impl LandmarkStyle {
    /// Draws every landmark with `spec`.
    pub fn uniform(spec: DrawingSpec) -> Self {
        Self {
            specs: Vec::new(),
            fallback: spec,
        }
    }

    /// Sets the spec of landmark `index`.
    pub fn with(mut self, index: usize, spec: DrawingSpec) -> Self {
        self.specs.retain(|(i, _)| *i != index);
        self.specs.push((index, spec));
        self
    }

    pub fn get(&self, index: usize) -> DrawingSpec {
        self.specs
            .iter()
            .find(|(i, _)| *i == index)
            .map_or(self.fallback, |(_, spec)| *spec)
    }

    /// Filled circles of radius 5, colored by finger.
    pub fn hand_default() -> Self {
        use LandmarkIdx::*;

        let spec = |color| DrawingSpec::new(color, Stroke::Filled, 5);
        let groups: [(&[LandmarkIdx], Color); 6] = [
            (
                &[
                    Wrist,
                    ThumbCmc,
                    IndexFingerMcp,
                    MiddleFingerMcp,
                    RingFingerMcp,
                    PinkyMcp,
                ],
                palette::RED,
            ),
            (&[ThumbMcp, ThumbIp, ThumbTip], palette::PEACH),
            (
                &[IndexFingerPip, IndexFingerDip, IndexFingerTip],
                palette::PURPLE,
            ),
            (
                &[MiddleFingerPip, MiddleFingerDip, MiddleFingerTip],
                palette::YELLOW,
            ),
            (&[RingFingerPip, RingFingerDip, RingFingerTip], palette::GREEN),
            (&[PinkyPip, PinkyDip, PinkyTip], palette::BLUE),
        ];

        groups
            .iter()
            .flat_map(|(landmarks, color)| landmarks.iter().map(move |lm| (*lm as usize, *color)))
            .fold(Self::uniform(spec(palette::RED)), |style, (index, color)| {
                style.with(index, spec(color))
            })
    }
}

impl Default for LandmarkStyle {
    fn default() -> Self {
        Self::uniform(DrawingSpec::default())
    }
}

/// Per-connection drawing specs.
#[derive(Debug, Clone)]
pub struct ConnectionStyle {
    specs: Vec<(Connection, DrawingSpec)>,
    fallback: DrawingSpec,
}

impl ConnectionStyle {
    pub fn uniform(spec: DrawingSpec) -> Self {
        Self {
            specs: Vec::new(),
            fallback: spec,
        }
    }

    pub fn with(mut self, connection: Connection, spec: DrawingSpec) -> Self {
        self.specs.retain(|(c, _)| *c != connection);
        self.specs.push((connection, spec));
        self
    }

    pub fn get(&self, connection: Connection) -> DrawingSpec {
        self.specs
            .iter()
            .find(|(c, _)| *c == connection)
            .map_or(self.fallback, |(_, spec)| *spec)
    }

    /// Gray palm outline of width 3, fingers of width 2 in their landmark colors.
    pub fn hand_default() -> Self {
        let groups: [(&[Connection], DrawingSpec); 6] = [
            (
                HAND_PALM_CONNECTIONS,
                DrawingSpec::new(palette::GRAY, Stroke::Width(3), 2),
            ),
            (
                HAND_THUMB_CONNECTIONS,
                DrawingSpec::new(palette::PEACH, Stroke::Width(2), 2),
            ),
            (
                HAND_INDEX_FINGER_CONNECTIONS,
                DrawingSpec::new(palette::PURPLE, Stroke::Width(2), 2),
            ),
            (
                HAND_MIDDLE_FINGER_CONNECTIONS,
                DrawingSpec::new(palette::YELLOW, Stroke::Width(2), 2),
            ),
            (
                HAND_RING_FINGER_CONNECTIONS,
                DrawingSpec::new(palette::GREEN, Stroke::Width(2), 2),
            ),
            (
                HAND_PINKY_FINGER_CONNECTIONS,
                DrawingSpec::new(palette::BLUE, Stroke::Width(2), 2),
            ),
        ];

        let mut style = Self::uniform(DrawingSpec::default());
        for (connections, spec) in groups {
            for &connection in connections {
                style = style.with(connection, spec);
            }
        }
        style
    }
}

impl Default for ConnectionStyle {
    fn default() -> Self {
        Self::uniform(DrawingSpec::default())
    }
}

/// Everything [`draw_landmarks`] needs to annotate a hand.
#[derive(Debug, Clone)]
pub struct HandsDrawing<'a> {
    pub connections: &'a [Connection],
    pub landmark_style: LandmarkStyle,
    pub connection_style: ConnectionStyle,
}

impl Default for HandsDrawing<'_> {
    fn default() -> Self {
        Self {
            connections: HAND_CONNECTIONS,
            landmark_style: LandmarkStyle::hand_default(),
            connection_style: ConnectionStyle::hand_default(),
        }
    }
}

/// Draws the landmarks and connections of `hand` onto `target`.
///
/// Landmarks outside of the frame are skipped, along with any connection touching them.
pub fn draw_landmarks<I: AsImageViewMut>(
    target: &mut I,
    hand: &HandLandmarks,
    drawing: &HandsDrawing<'_>,
) {
    draw_landmarks_impl(&mut target.as_view_mut(), hand, drawing);
}

fn draw_landmarks_impl(
    target: &mut ImageViewMut<'_>,
    hand: &HandLandmarks,
    drawing: &HandsDrawing<'_>,
) {
    let (width, height) = (target.width(), target.height());
    let pixels = hand
        .landmarks()
        .iter()
        .map(|lm| {
            let visible = (0.0..=1.0).contains(&lm.x) && (0.0..=1.0).contains(&lm.y);
            visible.then(|| (to_pixel(lm.x, width), to_pixel(lm.y, height)))
        })
        .collect::<Vec<_>>();

    for &(start, end) in drawing.connections {
        if let (Some(&Some((sx, sy))), Some(&Some((ex, ey)))) = (pixels.get(start), pixels.get(end))
        {
            let spec = drawing.connection_style.get((start, end));
            draw::line(target, sx, sy, ex, ey)
                .color(spec.color)
                .stroke_width(spec.thickness.line_width());
        }
    }

    for (index, pixel) in pixels.iter().enumerate() {
        let Some((x, y)) = *pixel else { continue };
        let spec = drawing.landmark_style.get(index);
        let radius = spec.circle_radius;

        // White border around the landmark.
        let border = (radius + 1).max((radius as f32 * 1.2) as u32);
        stroke(draw::circle(target, x, y, 2 * border + 1).color(palette::WHITE), spec.thickness);
        stroke(draw::circle(target, x, y, 2 * radius + 1).color(spec.color), spec.thickness);
    }
}

fn stroke(circle: &mut draw::DrawCircle<'_>, thickness: Stroke) {
    match thickness {
        Stroke::Width(width) => circle.stroke_width(width),
        Stroke::Filled => circle.fill(),
    };
}

fn to_pixel(coord: f32, size: u32) -> i32 {
    ((coord * size as f32).floor() as i32).min(size as i32 - 1)
}
