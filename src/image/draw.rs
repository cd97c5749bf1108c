//! Drawing primitives.
//!
//! Every function returns a guard that draws the shape when dropped. Methods on the guard customize
//! the shape before that happens.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10},
        MonoFont, MonoTextStyle,
    },
    prelude::*,
    primitives::{self, Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use super::{AsImageViewMut, Color, ImageViewMut};

/// Guard returned by [`line`]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: ImageViewMut<'a>,
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    /// Sets the line's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        match Line::new(self.start, self.end)
            .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
            .draw(&mut Target(self.image.reborrow()))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`circle`]; draws the circle when dropped and allows customization.
pub struct DrawCircle<'a> {
    image: ImageViewMut<'a>,
    center: Point,
    diameter: u32,
    color: Color,
    stroke_width: u32,
    filled: bool,
}

impl DrawCircle<'_> {
    /// Sets the circle's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the width of the circle's outline.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }

    /// Fills the circle instead of only drawing its outline.
    pub fn fill(&mut self) -> &mut Self {
        self.filled = true;
        self
    }
}

impl Drop for DrawCircle<'_> {
    fn drop(&mut self) {
        let circle = primitives::Circle::with_center(self.center, self.diameter);
        let style = if self.filled {
            PrimitiveStyleBuilder::new().fill_color(self.color).build()
        } else {
            PrimitiveStyle::with_stroke(self.color, self.stroke_width)
        };
        match circle
            .into_styled(style)
            .draw(&mut Target(self.image.reborrow()))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: ImageViewMut<'a>,
    position: Point,
    text: &'a str,
    color: Color,
    font: &'static MonoFont<'static>,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Puts the text's baseline on the `y` coordinate, so that letters sit on it.
    pub fn align_baseline(&mut self) -> &mut Self {
        self.baseline = Baseline::Alphabetic;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }

    /// Uses a 10x20 pixel font instead of the default 6x10 one.
    pub fn large(&mut self) -> &mut Self {
        self.font = &FONT_10X20;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(self.font, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        match Text::with_text_style(self.text, self.position, character_style, text_style)
            .draw(&mut Target(self.image.reborrow()))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a line between two points.
pub fn line<I: AsImageViewMut>(
    image: &mut I,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
) -> DrawLine<'_> {
    DrawLine {
        image: image.as_view_mut(),
        start: Point::new(start_x, start_y),
        end: Point::new(end_x, end_y),
        color: Color::BLUE,
        stroke_width: 1,
    }
}

/// Draws a circle centered on `(x, y)`.
///
/// Odd diameters place the circle exactly on the center pixel.
pub fn circle<I: AsImageViewMut>(image: &mut I, x: i32, y: i32, diameter: u32) -> DrawCircle<'_> {
    DrawCircle {
        image: image.as_view_mut(),
        center: Point::new(x, y),
        diameter,
        color: Color::GREEN,
        stroke_width: 1,
        filled: false,
    }
}

/// Draws a text string.
///
/// By default, the text is drawn centered horizontally and vertically around `x` and `y`.
pub fn text<'a, I: AsImageViewMut>(
    image: &'a mut I,
    x: i32,
    y: i32,
    text: &'a str,
) -> DrawText<'a> {
    DrawText {
        image: image.as_view_mut(),
        position: Point::new(x, y),
        text,
        color: Color::RED,
        font: &FONT_6X10,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

struct Target<'a>(ImageViewMut<'a>);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        let (width, height) = (self.0.width(), self.0.height());

        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size { width, height },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = (self.0.width(), self.0.height());
        for Pixel(pos, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(pos.x), u32::try_from(pos.y)) {
                if x < width && y < height {
                    self.0.set(x, y, color);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::image::Image;

    use super::*;

    fn white(width: u32, height: u32) -> Image {
        let mut image = Image::new(width, height);
        image.clear(Color::WHITE);
        image
    }

    #[test]
    fn horizontal_line() {
        let mut image = white(10, 5);
        line(&mut image, 1, 2, 8, 2).color(Color::BLACK);
        assert_eq!(image.get(1, 2), Color::BLACK);
        assert_eq!(image.get(5, 2), Color::BLACK);
        assert_eq!(image.get(8, 2), Color::BLACK);
        assert_eq!(image.get(0, 2), Color::WHITE);
        assert_eq!(image.get(5, 1), Color::WHITE);
    }

    #[test]
    fn line_clips_to_image() {
        let mut image = white(4, 4);
        line(&mut image, -10, 0, 10, 0).color(Color::BLACK);
        assert_eq!(image.get(0, 0), Color::BLACK);
        assert_eq!(image.get(3, 0), Color::BLACK);
    }

    #[test]
    fn filled_circle() {
        let mut image = white(11, 11);
        circle(&mut image, 5, 5, 7).color(Color::RED).fill();
        assert_eq!(image.get(5, 5), Color::RED);
        assert_eq!(image.get(3, 5), Color::RED);
        assert_eq!(image.get(0, 0), Color::WHITE);
    }

    #[test]
    fn outlined_circle() {
        let mut image = white(11, 11);
        circle(&mut image, 5, 5, 7).color(Color::RED);
        assert_eq!(image.get(5, 5), Color::WHITE);
        assert_eq!(image.get(2, 5), Color::RED);
    }

    #[test]
    fn text_draws_something() {
        let mut image = white(80, 40);
        text(&mut image, 2, 30, "30")
            .color(Color::BLACK)
            .large()
            .align_left()
            .align_baseline();
        assert!(image.data().chunks(4).any(|px| px == [0, 0, 0, 255]));
        // The 20 pixel glyph cell ends a few rows below the baseline.
        assert!((36..40).all(|y| (0..80).all(|x| image.get(x, y) == Color::WHITE)));
    }
}
