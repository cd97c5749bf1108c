//! V4L2 webcam access.
//!
//! Only `VIDEO_CAPTURE` devices delivering JFIF JPEG or Motion JPEG frames are supported.

use std::cmp::Reverse;

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::config;
use crate::image::{Image, Resolution};
use crate::num::TotalF32;
use crate::timer::Timer;

/// Whether to give up the requested frame rate or the requested resolution first when the camera
/// cannot deliver both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    #[default]
    Resolution,
    Framerate,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Format negotiation options for [`Webcam::open`].
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Only opens the webcam with this name.
    ///
    /// Takes precedence over `HANDMARK_WEBCAM_NAME`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Requests at least this resolution.
    ///
    /// The smallest mode meeting it is used. If the camera has no such mode, negotiation falls
    /// back to what it supports.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Requests at least this frame rate.
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

fn supported_formats(device: &Device) -> anyhow::Result<(Pixelformat, Vec<FrameFormat>)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }
    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let sizes = match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => sizes,
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    };

    let mut formats = Vec::new();
    for size in sizes {
        let intervals = match device.frame_intervals(pixel_format, size.width(), size.height())? {
            FrameIntervals::Discrete(intervals) => intervals,
            FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                bail!("stepwise or continuous frame rates are not supported")
            }
        };
        for interval in intervals {
            formats.push(FrameFormat {
                resolution: Resolution::new(size.width(), size.height()),
                frame_interval: *interval.fract(),
            });
        }
    }

    Ok((pixel_format, formats))
}

/// Picks the best format, dropping preferences one by one until a format matches.
fn negotiate_format(formats: &[FrameFormat], mut prefs: FramePrefs) -> Option<FrameFormat> {
    loop {
        if let Some(fmt) = negotiate_format_step(formats, prefs) {
            return Some(fmt);
        }

        log::debug!("no webcam format matches {:?}", prefs);
        let dropped = match prefs.pref {
            ParamPreference::Resolution => {
                prefs.fps.take().is_some() || prefs.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                prefs.resolution.take().is_some() || prefs.fps.take().is_some()
            }
        };
        if !dropped {
            return None;
        }
    }
}

fn negotiate_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut eligible = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| {
                (1.0 / fmt.frame_interval.as_f32()).round() >= fps as f32
            })
        })
        .copied()
        .collect::<Vec<_>>();

    // The best format sorts last: the smallest one meeting a requested resolution, otherwise the
    // largest one.
    let size = |fmt: &FrameFormat| {
        let pixels = fmt.resolution.num_pixels() as i64;
        if prefs.resolution.is_some() {
            -pixels
        } else {
            pixels
        }
    };
    let interval = |fmt: &FrameFormat| Reverse(TotalF32(fmt.frame_interval.as_f32()));
    match prefs.pref {
        ParamPreference::Resolution => eligible.sort_by_key(|fmt| (size(fmt), interval(fmt))),
        ParamPreference::Framerate => eligible.sort_by_key(|fmt| (interval(fmt), size(fmt))),
    }
    eligible.last().copied()
}

/// A webcam yielding a stream of [`Image`]s.
///
/// The device is released when this is dropped.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam.
    ///
    /// This can block for hundreds of milliseconds while the webcam initializes.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_impl(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => log::debug!("{}", e),
                },
                Err(e) => log::warn!("{}", e),
            }
        }

        bail!("no supported webcam device found")
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = options.name.as_deref().or(config::webcam_name()) {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );
        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixel_format, formats) = supported_formats(&dev)?;
        let Some(format) = negotiate_format(&formats, options.frame) else {
            bail!("failed to negotiate a format with {}", caps.card());
        };
        let capture = dev.video_capture(PixFormat::new(
            format.resolution.width(),
            format.resolution.height(),
            pixel_format,
        ))?;

        let actual_format = capture.format();
        let resolution = Resolution::new(actual_format.width(), actual_format.height());
        let interval = capture.set_frame_interval(format.frame_interval)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / interval.as_f32(),
        );

        Ok(Some(Self {
            stream: capture.into_stream(2)?,
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Returns the negotiated frame resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Blocks until the next frame is available and returns it.
    ///
    /// Corrupted frames are logged and replaced by a blank image, so that the caller's frame
    /// pacing is not disturbed. Device errors are returned.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let (t_decode, res) = (&self.t_decode, self.resolution);
        let image = self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            let image = t_decode
                .time(|| Image::decode_jpeg(&buf))
                .unwrap_or_else(|e| {
                    log::error!("webcam decode error: {}", e);
                    Image::new(res.width(), res.height())
                });
            Ok(image)
        })?;
        Ok(image)
    }

    /// Returns profiling timers for frame dequeueing and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}
