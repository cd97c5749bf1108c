//! A minimal GUI for showing frames and reading key presses.
//!
//! The windowing event loop has to own the main thread, so applications using this module must be
//! started through [`crate::run`], which moves the application code to a second thread.

mod renderer;

use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc, Mutex, OnceLock, PoisonError,
    },
    thread,
    time::Duration,
};

use anyhow::{anyhow, bail};
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy},
    window::WindowId,
};

use crate::image::{Image, Resolution};
use crate::termination::Termination;

use self::renderer::{Gpu, Renderer};

/// User input reported back to the application by [`wait_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A character was typed into one of the windows.
    Key(char),
    /// The user asked to close one of the windows.
    CloseRequested,
}

#[derive(Debug)]
enum Msg {
    /// A new frame is waiting in the [`FrameSlots`] under this key.
    NewFrame(String),
}

#[derive(Debug)]
struct Frame {
    res: Resolution,
    data: Vec<u8>,
}

/// The latest frame of each window that the event loop has not picked up yet.
///
/// Frames shown faster than the windows can present them replace each other instead of queueing
/// up.
#[derive(Default)]
struct FrameSlots {
    frames: Mutex<HashMap<String, Frame>>,
}

impl FrameSlots {
    /// Stores `frame` as the next one for window `key`.
    ///
    /// Returns `true` if the slot was empty, meaning the event loop has to be woken up.
    fn put(&self, key: &str, frame: Frame) -> bool {
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        frames.insert(key.to_string(), frame).is_none()
    }

    fn take(&self, key: &str) -> Option<Frame> {
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        frames.remove(key)
    }
}

struct Channels {
    proxy: Mutex<EventLoopProxy<Msg>>,
    input: Mutex<Receiver<Input>>,
    slots: Arc<FrameSlots>,
}

static CHANNELS: OnceLock<Channels> = OnceLock::new();

fn channels() -> anyhow::Result<&'static Channels> {
    match CHANNELS.get() {
        Some(channels) => Ok(channels),
        None => bail!("GUI is not running, start the application with `handmark::run`"),
    }
}

struct Gui {
    gpu: Rc<Gpu>,
    windows: HashMap<String, Renderer>,
    win_id_to_key: HashMap<WindowId, String>,
    input: Sender<Input>,
    slots: Arc<FrameSlots>,
}

impl Gui {
    fn new(input: Sender<Input>, slots: Arc<FrameSlots>) -> anyhow::Result<Self> {
        Ok(Self {
            gpu: Rc::new(pollster::block_on(Gpu::open())?),
            windows: HashMap::new(),
            win_id_to_key: HashMap::new(),
            input,
            slots,
        })
    }

    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::NewFrame(key)) => {
                    let Some(Frame { res, data }) = self.slots.take(&key) else {
                        return;
                    };
                    if !self.windows.contains_key(&key) {
                        log::debug!("creating window for image '{key}' at {res}");
                        match Renderer::open(target, &key, res, self.gpu.clone()) {
                            Ok(renderer) => {
                                self.win_id_to_key.insert(renderer.window_id(), key.clone());
                                self.windows.insert(key.clone(), renderer);
                            }
                            Err(e) => {
                                log::error!("failed to open window '{key}': {e:#}");
                                process::exit(1);
                            }
                        }
                    }
                    if let Some(renderer) = self.windows.get_mut(&key) {
                        renderer.show(res, &data);
                    }
                }
                Event::RedrawRequested(window) => {
                    if let Some(renderer) = self.renderer_mut(window) {
                        renderer.redraw();
                    }
                }
                Event::WindowEvent { event, .. } => {
                    let input = match event {
                        WindowEvent::ReceivedCharacter(c) => Input::Key(c),
                        WindowEvent::CloseRequested => Input::CloseRequested,
                        _ => return,
                    };
                    // The application may have stopped listening already.
                    self.input.send(input).ok();
                }
                _ => {}
            }
        })
    }

    fn renderer_mut(&mut self, window: WindowId) -> Option<&mut Renderer> {
        let key = self.win_id_to_key.get(&window)?;
        self.windows.get_mut(key)
    }
}

/// Runs the GUI event loop on the calling thread, and `cb` on a new thread.
///
/// The process exits when `cb` returns, with a status derived from its return value.
pub(crate) fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    let (input_tx, input_rx) = mpsc::channel();
    let slots = Arc::new(FrameSlots::default());
    let channels = Channels {
        proxy: Mutex::new(event_loop.create_proxy()),
        input: Mutex::new(input_rx),
        slots: slots.clone(),
    };
    if CHANNELS.set(channels).is_err() {
        panic!("`handmark::run` called more than once");
    }

    thread::spawn(move || match catch_unwind(AssertUnwindSafe(cb)) {
        Ok(result) => {
            if result.is_success() {
                process::exit(0);
            }
            // Prints the error, if any.
            result.report();
            process::exit(1);
        }
        Err(_payload) => {
            // The panic hook has already printed the message; 101 matches libstd.
            process::exit(101);
        }
    });

    match Gui::new(input_tx, slots) {
        Ok(gui) => gui.run(event_loop),
        Err(e) => {
            log::error!("failed to initialize GUI: {e:#}");
            process::exit(1);
        }
    }
}

/// Shows `image` in the window titled `key`, opening it if needed.
///
/// The window is sized to the first image shown in it. If the window has not presented the
/// previous image yet, that image is dropped.
pub fn show_image(key: impl Into<String>, image: &Image) -> anyhow::Result<()> {
    let channels = channels()?;
    let key = key.into();
    let frame = Frame {
        res: image.resolution(),
        data: image.data().to_vec(),
    };
    if !channels.slots.put(&key, frame) {
        log::trace!("window '{key}' is behind, replacing its pending frame");
        return Ok(());
    }

    channels
        .proxy
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .send_event(Msg::NewFrame(key))
        .map_err(|_closed| anyhow!("GUI event loop has shut down"))
}

/// Waits up to `timeout` for user input in any window.
///
/// Returns [`None`] if nothing happened in time, or if the GUI is not running.
pub fn wait_key(timeout: Duration) -> Option<Input> {
    let channels = CHANNELS.get()?;
    let input = channels.input.lock().unwrap_or_else(PoisonError::into_inner);
    input.recv_timeout(timeout).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32) -> Frame {
        Frame {
            res: Resolution::new(width, 1),
            data: vec![0; width as usize * 4],
        }
    }

    #[test]
    fn pending_frames_are_replaced() {
        let slots = FrameSlots::default();
        assert!(slots.put("img", frame(1)));
        assert!(!slots.put("img", frame(2)));
        assert!(slots.put("other", frame(3)));

        let latest = slots.take("img").unwrap();
        assert_eq!(latest.res, Resolution::new(2, 1));
        assert_eq!(latest.data.len(), 8);
        assert!(slots.take("img").is_none());

        // Once taken, the next frame needs a new wake-up.
        assert!(slots.put("img", frame(4)));
        assert_eq!(slots.take("other").unwrap().res, Resolution::new(3, 1));
    }

    #[test]
    fn not_running() {
        assert!(show_image("img", &Image::new(4, 4)).is_err());
        assert_eq!(wait_key(Duration::from_millis(1)), None);
    }
}
