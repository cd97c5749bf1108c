//! Image storage, views and drawing.
//!
//! - [`Image`] is an owned RGBA frame, as produced by the webcam and shown in the window.
//! - [`ImageView`] and [`ImageViewMut`] are borrowed, possibly rotated, views into an [`Image`].
//!   The hand pipeline uses them to crop the regions of interest fed to the networks.
//! - [`AsImageView`] and [`AsImageViewMut`] abstract over images and views.
//! - [`draw`] contains the primitives landmarks and overlays are drawn with.

pub mod draw;
mod jpeg;
mod rect;
mod resolution;

#[cfg(test)]
mod tests;

use std::fmt;

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{ImageBuffer, Rgba, RgbaImage};

pub use rect::*;
pub use resolution::*;

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    // RGBA8 matches the texture format the window uploads frames with.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Decodes a JFIF JPEG or Motion JPEG frame.
    ///
    /// The decoder is selected with `HANDMARK_JPEG_BACKEND`.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        jpeg::decode_jpeg(data)
    }

    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] at `(0, 0)` covering the whole image.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Gets the color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Creates an immutable view into an area of this image, specified by `rect`.
    ///
    /// Pixels of `rect` that lie outside of the image read as [`Color::NULL`]. The returned view
    /// always has the size of `rect`.
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'_> {
        ImageView {
            image: self,
            data: ViewData::full(self).view(rect),
        }
    }

    /// Creates a mutable view into an area of this image, specified by `rect`.
    ///
    /// Pixels of `rect` that lie outside of the image read as [`Color::NULL`] and ignore writes.
    pub fn view_mut(&mut self, rect: impl Into<RotatedRect>) -> ImageViewMut<'_> {
        ImageViewMut {
            data: ViewData::full(self).view(rect),
            image: self,
        }
    }

    /// Mirrors the image around its vertical axis.
    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.buf);
    }

    /// Sets every pixel to `color`.
    pub fn clear(&mut self, color: Color) {
        self.buf.pixels_mut().for_each(|pix| pix.0 = color.0);
    }

    /// Returns the raw RGBA8 pixel data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

#[derive(Debug, Clone, Copy)]
struct ViewData {
    /// Rectangle in the root image's coordinates.
    rect: RotatedRect,
}

impl ViewData {
    fn full(image: &Image) -> Self {
        Self {
            rect: image.rect().into(),
        }
    }

    fn view(&self, rect: impl Into<RotatedRect>) -> Self {
        let rect: RotatedRect = rect.into();
        let radians = self.rect.rotation_radians() + rect.rotation_radians();

        let (cx, cy) = rect.rect().center();
        let [cx, cy] = self.rect.transform_out(cx, cy);
        let (w, h) = (rect.rect().width(), rect.rect().height());

        Self {
            rect: RotatedRect::new(Rect::from_center(cx, cy, w, h), radians),
        }
    }

    fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width(), self.height())
    }

    fn width(&self) -> f32 {
        self.rect.rect().width()
    }

    fn height(&self) -> f32 {
        self.rect.rect().height()
    }

    /// Maps a pixel of the view to the pixel of `image` whose center is closest.
    fn image_coord(&self, x: u32, y: u32, image: &Image) -> Option<(u32, u32)> {
        let [x, y] = self.rect.transform_out(x as f32 + 0.5, y as f32 + 0.5);
        let [x, y] = [(x - 0.5).round(), (y - 0.5).round()];
        if x < 0.0 || y < 0.0 || x >= image.width() as f32 || y >= image.height() as f32 {
            return None;
        }

        Some((x as u32, y as u32))
    }

    fn get(&self, x: u32, y: u32, image: &Image) -> Color {
        match self.image_coord(x, y, image) {
            Some((x, y)) => Color(image.buf[(x, y)].0),
            None => Color::NULL,
        }
    }
}

/// An immutable view of a rectangular section of an [`Image`].
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    data: ViewData,
}

impl<'a> ImageView<'a> {
    pub fn width(&self) -> u32 {
        self.data.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.data.height() as u32
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] at `(0, 0)` with the size of this view.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.data.rect()
    }

    /// Gets the color at the given pixel coordinates of the view.
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.data.get(x, y, self.image)
    }

    /// Creates an immutable subview into an area of this view, specified by `rect`.
    ///
    /// Parts of `rect` outside of this view still access the underlying [`Image`]. Parts outside
    /// of the [`Image`] read as [`Color::NULL`].
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'a> {
        ImageView {
            image: self.image,
            data: self.data.view(rect),
        }
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ImageView", self.width(), self.height())
    }
}

/// A mutable view of a rectangular section of an [`Image`].
pub struct ImageViewMut<'a> {
    image: &'a mut Image,
    data: ViewData,
}

impl<'a> ImageViewMut<'a> {
    pub fn width(&self) -> u32 {
        self.data.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.data.height() as u32
    }

    /// Sets the color at the given pixel coordinates of the view.
    ///
    /// Writes to pixels outside of the underlying [`Image`] are ignored.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        if let Some((x, y)) = self.data.image_coord(x, y, self.image) {
            self.image.buf[(x, y)] = Rgba(color.0);
        }
    }

    /// Borrows an identical [`ImageViewMut`] from `self` that may have a shorter lifetime.
    ///
    /// This is the explicit equivalent of the implicit reborrowing of `&mut` references.
    pub fn reborrow(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            data: self.data,
        }
    }
}

impl fmt::Debug for ImageViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ImageViewMut", self.width(), self.height())
    }
}

/// An 8-bit RGBA color.
///
/// Colors are always in the sRGB color space and use non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

/// Trait for types that can be treated as read-only views of image data.
///
/// Implemented by [`Image`], [`ImageView`] and [`ImageViewMut`].
pub trait AsImageView {
    fn as_view(&self) -> ImageView<'_>;
}

/// Trait for types that can be treated as mutable views of image data.
pub trait AsImageViewMut: AsImageView {
    fn as_view_mut(&mut self) -> ImageViewMut<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(self.rect())
    }
}

impl AsImageView for ImageView<'_> {
    fn as_view(&self) -> ImageView<'_> {
        *self
    }
}

impl AsImageViewMut for Image {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.view_mut(self.rect())
    }
}

impl AsImageView for ImageViewMut<'_> {
    fn as_view(&self) -> ImageView<'_> {
        ImageView {
            data: self.data,
            image: self.image,
        }
    }
}

impl AsImageViewMut for ImageViewMut<'_> {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.reborrow()
    }
}

impl<V: AsImageView> AsImageView for &V {
    fn as_view(&self) -> ImageView<'_> {
        (*self).as_view()
    }
}

impl<V: AsImageView> AsImageView for &mut V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageViewMut> AsImageViewMut for &mut V {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        (*self).as_view_mut()
    }
}
