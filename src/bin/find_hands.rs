//! Draws every hand found in the webcam feed, in MediaPipe's default style.

use std::time::Duration;

use handmark::detector::HandDetector;
use handmark::gui::{self, Input};
use handmark::hand::{HandsDrawing, HandsOptions};
use handmark::image::{draw, Color, Resolution};
use handmark::timer::{FpsCounter, FrameRate};
use handmark::video::webcam::{Webcam, WebcamOptions};

fn main() {
    handmark::init_logger!();
    handmark::run(run);
}

fn run() -> anyhow::Result<()> {
    let webcam_options = WebcamOptions::default().resolution(Resolution::new(1200, 720));
    let mut webcam = Webcam::open(webcam_options)?;
    let mut detector = HandDetector::new(HandsOptions::default())?;
    let drawing = HandsDrawing::default();

    let mut frame_rate = FrameRate::new();
    let mut fps = FpsCounter::new("find_hands");
    loop {
        let mut image = webcam.read()?;
        let hands = detector.find_hands(&mut image, Some(&drawing))?;
        for hand in hands.iter() {
            log::trace!("{:?} hand, score {:.2}", hand.handedness(), hand.score());
        }

        image.flip_horizontal_in_place();
        if let Some(rate) = frame_rate.tick() {
            let text = (rate as u32).to_string();
            draw::text(&mut image, 20, 70, &text)
                .align_left()
                .align_baseline()
                .large()
                .color(Color::BLACK);
        }
        gui::show_image("img", &image)?;

        fps.tick_with(webcam.timers().chain(detector.model().timers()));

        if let Some(Input::Key('q') | Input::CloseRequested) =
            gui::wait_key(Duration::from_millis(1))
        {
            break;
        }
    }

    Ok(())
}
