//! Detection and landmark estimation of human hands.
//!
//! [`Hands`] combines the palm detection network in [`detection`] with the landmark network in
//! [`landmark`], and [`style`] draws its results.

pub mod detection;
pub mod landmark;
pub mod model;
pub mod style;

pub use landmark::{
    Connection, Handedness, LandmarkIdx, HAND_CONNECTIONS, HAND_INDEX_FINGER_CONNECTIONS,
    HAND_MIDDLE_FINGER_CONNECTIONS, HAND_PALM_CONNECTIONS, HAND_PINKY_FINGER_CONNECTIONS,
    HAND_RING_FINGER_CONNECTIONS, HAND_THUMB_CONNECTIONS, NUM_LANDMARKS,
};
pub use model::{
    HandLandmarks, HandModel, HandResults, Hands, HandsOptions, LandmarkStage, ModelComplexity,
    NormalizedLandmark, PalmStage,
};
pub use style::{draw_landmarks, HandsDrawing};
