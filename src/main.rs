use std::time::Duration;

use handmark::detector::{HandDetector, PositionOptions};
use handmark::gui::{self, Input};
use handmark::hand::{HandsOptions, LandmarkIdx};
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
    let options = PositionOptions::default()
        .draw_points(true)
        .draw_connections(true);

    let mut frame_rate = FrameRate::new();
    let mut fps = FpsCounter::new("handmark");
    loop {
        let mut image = webcam.read()?;
        let landmarks = detector.find_position(&mut image, 0, &options)?;
        if let Some(tip) = landmarks.get(LandmarkIdx::ThumbTip as usize) {
            log::trace!("thumb tip at {},{}", tip.x, tip.y);
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

        match gui::wait_key(Duration::from_millis(1)) {
            Some(Input::Key('q') | Input::CloseRequested) => break,
            _ => {}
        }
    }

    Ok(())
}
