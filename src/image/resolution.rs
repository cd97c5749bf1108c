use std::fmt;

/// Size (`width x height`) of an image, camera frame, or window, in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// `1280x720`
    pub const RES_720P: Self = Self::new(1280, 720);

    /// `1920x1080`
    pub const RES_1080P: Self = Self::new(1920, 1080);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns the reduced aspect ratio, or [`None`] if either dimension is 0.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Ratio of an image's width to its height.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Invariant: both nonzero, and coprime.
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1, the input shape of both hand networks.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Creates the reduced ratio `width:height`. Returns [`None`] if either side is 0.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let gcd = gcd(width, height);
        Some(Self {
            width: width / gcd,
            height: height / gcd,
        })
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b > 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(6, 9), 3);
        assert_eq!(gcd(1200, 720), 240);
        assert_eq!(gcd(7, 13), 1);
        assert_eq!(gcd(0, 7), 7);
        assert_eq!(gcd(7, 0), 7);
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(Resolution::new(1200, 720).aspect_ratio().unwrap().to_string(), "5:3");
        assert_eq!(
            Resolution::RES_1080P.aspect_ratio(),
            Resolution::RES_720P.aspect_ratio()
        );
        assert_eq!(Resolution::new(224, 224).aspect_ratio(), Some(AspectRatio::SQUARE));
        assert_eq!(Resolution::new(0, 720).aspect_ratio(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Resolution::new(1200, 720).to_string(), "1200x720");
        assert_eq!(Resolution::new(1200, 720).num_pixels(), 864_000);
    }
}
