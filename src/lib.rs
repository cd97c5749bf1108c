//! Hand landmark detection on webcam frames.
//!
//! [`detector::HandDetector`] runs a [`hand::HandModel`] on a frame and returns the landmarks of a
//! hand in pixel coordinates, optionally drawing them onto the frame. The default model,
//! [`hand::Hands`], runs MediaPipe's palm detection and hand landmark networks with `tract`.
//!
//! # Environment Variables
//!
//! * `HANDMARK_MODEL_DIR`: Directory containing `palm_detection_{lite,full}.onnx` and
//!   `hand_landmark_{lite,full}.onnx`. Defaults to `3rdparty/onnx`.
//! * `HANDMARK_WEBCAM_NAME`: Forces the device to use for [`Webcam`]s opened without an explicit
//!   device name. If unset, the first device that supports a compatible image format is used.
//! * `HANDMARK_JPEG_BACKEND`: Selects the JPEG decoder for webcam frames. Allowed values are
//!   `zune-jpeg` (the default) and `jpeg-decoder`.
//!
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod config;
pub mod detection;
pub mod detector;
pub mod gui;
pub mod hand;
pub mod image;
pub mod iter;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod termination;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and `handmark` log at *debug* level, `wgpu` at *warn* level. `RUST_LOG`
/// overrides both.
///
/// If a global logger is already registered, this macro does nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}

/// Runs `cb` alongside the GUI event loop, then exits the process.
///
/// The event loop takes over the calling thread, which must be the main thread. `cb` runs on a
/// separate thread and can use [`gui::show_image`] and [`gui::wait_key`]. The exit status is 0 if
/// `cb` returned successfully, 1 if it returned an error (which is printed), and 101 if it
/// panicked.
pub fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: termination::Termination + Send,
{
    gui::run(cb)
}
