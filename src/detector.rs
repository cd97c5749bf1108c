//! The hand detector wrapper used by the capture loop.
//!
//! [`HandDetector`] runs a [`HandModel`] on camera frames, keeps the most recent result around,
//! and converts the model's normalized landmarks into pixel coordinates of the frame.

use crate::hand::{
    draw_landmarks, Connection, HandLandmarks, HandModel, HandResults, Hands, HandsDrawing,
    HandsOptions, NormalizedLandmark, HAND_CONNECTIONS,
};
use crate::image::{draw, AsImageViewMut, Color, Resolution};

/// Finds hands in frames and reports their landmarks in pixel coordinates.
pub struct HandDetector<M: HandModel = Hands> {
    model: M,
    results: Option<HandResults>,
}

impl HandDetector<Hands> {
    /// Loads the default two-stage hand model.
    pub fn new(options: HandsOptions) -> anyhow::Result<Self> {
        Ok(Self::with_model(Hands::new(options)?))
    }
}

impl<M: HandModel> HandDetector<M> {
    pub fn with_model(model: M) -> Self {
        Self {
            model,
            results: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Returns the result of the most recent [`find_hands`] or [`find_position`] call.
    ///
    /// [`find_hands`]: Self::find_hands
    /// [`find_position`]: Self::find_position
    pub fn results(&self) -> Option<&HandResults> {
        self.results.as_ref()
    }

    fn process<I: AsImageViewMut>(&mut self, frame: &I) -> anyhow::Result<&HandResults> {
        let results = self.model.process(&frame.as_view())?;
        Ok(&*self.results.insert(results))
    }

    /// Runs the model on `frame`, and draws every hand it finds if `drawing` is given.
    pub fn find_hands<I: AsImageViewMut>(
        &mut self,
        frame: &mut I,
        drawing: Option<&HandsDrawing<'_>>,
    ) -> anyhow::Result<&HandResults> {
        let results = self.process(frame)?;
        if let Some(drawing) = drawing {
            for hand in results.iter() {
                draw_landmarks(frame, hand, drawing);
            }
        }

        Ok(results)
    }

    /// Runs the model on `frame` and returns the landmarks of hand `hand_no` in pixel coordinates.
    ///
    /// If that hand was not found the list is empty and nothing is drawn.
    pub fn find_position<I: AsImageViewMut>(
        &mut self,
        frame: &mut I,
        hand_no: usize,
        options: &PositionOptions<'_>,
    ) -> anyhow::Result<LandmarkList> {
        let res = frame.as_view().resolution();
        let list = match self.process(frame)?.get(hand_no) {
            Some(hand) => LandmarkList::from_hand(hand, res),
            None => return Ok(LandmarkList::default()),
        };

        if options.draw_connections {
            for (start, end) in list.segments(options.connections) {
                draw::line(frame, start.x, start.y, end.x, end.y)
                    .color(options.line_color)
                    .stroke_width(options.line_thickness);
            }
        }
        if options.draw_points {
            for point in list.iter() {
                draw::circle(frame, point.x, point.y, 2 * options.point_radius + 1)
                    .color(options.point_color)
                    .fill();
            }
        }

        Ok(list)
    }
}

/// Converts a normalized landmark to the pixel it falls on.
pub fn to_pixel(landmark: &NormalizedLandmark, res: Resolution) -> (i32, i32) {
    (
        (landmark.x * res.width() as f32).floor() as i32,
        (landmark.y * res.height() as f32).floor() as i32,
    )
}

/// A landmark in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandmarkPoint {
    pub index: usize,
    pub x: i32,
    pub y: i32,
}

/// The landmarks of one hand, in pixel coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandmarkList {
    points: Vec<LandmarkPoint>,
}

impl LandmarkList {
    pub fn from_hand(hand: &HandLandmarks, res: Resolution) -> Self {
        let points = hand
            .landmarks()
            .iter()
            .enumerate()
            .map(|(index, lm)| {
                let (x, y) = to_pixel(lm, res);
                LandmarkPoint { index, x, y }
            })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LandmarkPoint> {
        self.points.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LandmarkPoint> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[LandmarkPoint] {
        &self.points
    }

    /// Resolves each connection to its two endpoints.
    ///
    /// Connections referring to a landmark this list does not have are skipped.
    pub fn segments<'a>(
        &'a self,
        connections: &'a [Connection],
    ) -> impl Iterator<Item = (LandmarkPoint, LandmarkPoint)> + 'a {
        connections
            .iter()
            .filter_map(|&(start, end)| Some((*self.get(start)?, *self.get(end)?)))
    }
}

/// What [`HandDetector::find_position`] draws, and how.
#[derive(Debug, Clone)]
pub struct PositionOptions<'a> {
    pub draw_points: bool,
    pub draw_connections: bool,
    pub connections: &'a [Connection],
    pub point_color: Color,
    pub point_radius: u32,
    pub line_color: Color,
    pub line_thickness: u32,
}

impl Default for PositionOptions<'_> {
    fn default() -> Self {
        Self {
            draw_points: false,
            draw_connections: false,
            connections: HAND_CONNECTIONS,
            point_color: Color::from_rgb8(0, 209, 206),
            point_radius: 3,
            line_color: Color::BLACK,
            line_thickness: 3,
        }
    }
}

impl<'a> PositionOptions<'a> {
    pub fn draw_points(mut self, draw: bool) -> Self {
        self.draw_points = draw;
        self
    }

    pub fn draw_connections(mut self, draw: bool) -> Self {
        self.draw_connections = draw;
        self
    }

    pub fn connections(mut self, connections: &'a [Connection]) -> Self {
        self.connections = connections;
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::hand::{Handedness, NUM_LANDMARKS};
    use crate::image::{Image, ImageView};

    use super::*;

    /// Reports the same hands for every frame.
    struct FixedModel {
        results: HandResults,
        calls: usize,
    }

    impl FixedModel {
        fn new(hands: Vec<HandLandmarks>) -> Self {
            Self {
                results: hands.into(),
                calls: 0,
            }
        }
    }

    impl HandModel for FixedModel {
        fn process(&mut self, _image: &ImageView<'_>) -> anyhow::Result<HandResults> {
            self.calls += 1;
            Ok(self.results.clone())
        }
    }

    fn hand(points: &[(f32, f32)]) -> HandLandmarks {
        let landmarks = points
            .iter()
            .map(|&(x, y)| NormalizedLandmark::new(x, y, 0.0))
            .collect();
        HandLandmarks::new(landmarks, Handedness::Right, 0.9)
    }

    fn white(width: u32, height: u32) -> Image {
        let mut image = Image::new(width, height);
        image.clear(Color::WHITE);
        image
    }

    #[test]
    fn pixel_conversion_floors() {
        let res = Resolution::new(640, 480);
        assert_eq!(to_pixel(&NormalizedLandmark::new(0.5, 0.5, 0.0), res), (320, 240));
        assert_eq!(to_pixel(&NormalizedLandmark::new(0.9999, 0.0, 0.0), res), (639, 0));
        // Slightly outside of the frame.
        assert_eq!(to_pixel(&NormalizedLandmark::new(-0.001, 1.01, 0.0), res), (-1, 484));
    }

    #[test]
    fn pixel_conversion_random() {
        let mut rng = fastrand::Rng::with_seed(0x6a3d_91f2_c4be_0317);
        for _ in 0..1000 {
            let (w, h) = (rng.u32(1..4000), rng.u32(1..4000));
            let (x, y) = (rng.f32(), rng.f32());
            let lm = NormalizedLandmark::new(x, y, rng.f32());
            let (px, py) = to_pixel(&lm, Resolution::new(w, h));
            assert_eq!(px, (x * w as f32).floor() as i32);
            assert_eq!(py, (y * h as f32).floor() as i32);
        }
    }

    #[test]
    fn no_hand_gives_empty_list() {
        let mut detector = HandDetector::with_model(FixedModel::new(Vec::new()));
        let mut frame = white(32, 32);
        let options = PositionOptions::default()
            .draw_points(true)
            .draw_connections(true);

        let list = detector.find_position(&mut frame, 0, &options).unwrap();
        assert!(list.is_empty());
        assert_eq!(detector.model().calls, 1);
        assert!(detector.results().unwrap().is_empty());
        assert_eq!(frame.data(), white(32, 32).data());

        let results = detector.find_hands(&mut frame, Some(&HandsDrawing::default())).unwrap();
        assert!(results.is_empty());
        assert_eq!(frame.data(), white(32, 32).data());
    }

    #[test]
    fn hand_index_out_of_range() {
        let mut detector = HandDetector::with_model(FixedModel::new(vec![hand(&[(0.5, 0.5)])]));
        let mut frame = white(32, 32);
        let options = PositionOptions::default().draw_points(true);
        assert!(detector.find_position(&mut frame, 1, &options).unwrap().is_empty());
        assert_eq!(frame.data(), white(32, 32).data());
        assert!(!detector.find_position(&mut frame, 0, &options).unwrap().is_empty());
    }

    #[test]
    fn indices_follow_landmark_order() {
        let points = (0..NUM_LANDMARKS)
            .map(|i| (i as f32 / NUM_LANDMARKS as f32, 0.5))
            .collect::<Vec<_>>();
        let mut detector = HandDetector::with_model(FixedModel::new(vec![hand(&points)]));
        let mut frame = white(210, 100);

        let list = detector
            .find_position(&mut frame, 0, &PositionOptions::default())
            .unwrap();
        assert_eq!(list.len(), NUM_LANDMARKS);
        for (i, point) in list.iter().enumerate() {
            assert_eq!(point.index, i);
            assert_eq!(point.y, 50);
        }
        assert_eq!(list.get(0).map(|p| p.x), Some(0));
        // Drawing is off by default.
        assert_eq!(frame.data(), white(210, 100).data());
    }

    #[test]
    fn one_segment_per_connection() {
        let points = (0..NUM_LANDMARKS)
            .map(|i| (i as f32 / 32.0, i as f32 / 64.0))
            .collect::<Vec<_>>();
        let list = LandmarkList::from_hand(&hand(&points), Resolution::new(64, 64));

        let segments = list.segments(HAND_CONNECTIONS).collect::<Vec<_>>();
        assert_eq!(segments.len(), HAND_CONNECTIONS.len());
        for ((start, end), &(a, b)) in segments.iter().zip(HAND_CONNECTIONS) {
            assert_eq!(start, &list.as_slice()[a]);
            assert_eq!(end, &list.as_slice()[b]);
        }

        assert_eq!(list.segments(&[(0, 1), (0, 99)]).count(), 1);
    }

    #[test]
    fn draws_connections() {
        let mut detector =
            HandDetector::with_model(FixedModel::new(vec![hand(&[(0.1, 0.5), (0.9, 0.5)])]));
        let mut frame = white(100, 100);
        let options = PositionOptions::default()
            .draw_connections(true)
            .connections(&[(0, 1)]);

        detector.find_position(&mut frame, 0, &options).unwrap();
        assert_eq!(frame.get(50, 50), Color::BLACK);
        assert_eq!(frame.get(50, 51), Color::BLACK);
        assert_eq!(frame.get(50, 60), Color::WHITE);
        assert_eq!(frame.get(5, 50), Color::WHITE);
    }

    #[test]
    fn draws_points() {
        let mut detector = HandDetector::with_model(FixedModel::new(vec![hand(&[(0.5, 0.5)])]));
        let mut frame = white(100, 100);
        let options = PositionOptions::default().draw_points(true);

        detector.find_position(&mut frame, 0, &options).unwrap();
        let color = Color::from_rgb8(0, 209, 206);
        assert_eq!(frame.get(50, 50), color);
        assert_eq!(frame.get(52, 50), color);
        assert_eq!(frame.get(50, 56), Color::WHITE);
    }
}
