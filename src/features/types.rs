use image::{GrayImage, Luma, RgbImage};
use imageproc::point::Point;
use std::f64::consts::PI;

/// One captured color frame. Dropped as soon as it has been preprocessed.
pub type Frame = RgbImage;

/// Foreground intensity stored in a [`Mask`].
pub const FOREGROUND: u8 = 255;

/// Binary foreground/background image derived from a [`Frame`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    image: GrayImage,
}

impl Mask {
    /// Wrap a grayscale image, treating every non-zero pixel as foreground.
    pub fn from_gray(mut image: GrayImage) -> Self {
        for pixel in image.pixels_mut() {
            if pixel[0] != 0 {
                *pixel = Luma([FOREGROUND]);
            }
        }
        Self { image }
    }

    /// Build a mask of the given size from a per-pixel foreground predicate.
    pub fn from_fn<F>(width: u32, height: u32, mut is_foreground: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let image = GrayImage::from_fn(width, height, |x, y| {
            if is_foreground(x, y) {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        });
        Self { image }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        let (w, h) = self.dimensions();
        w == 0 || h == 0
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y)[0] != 0
    }

    pub fn foreground_count(&self) -> usize {
        self.image.pixels().filter(|p| p[0] != 0).count()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }
}

/// Closed boundary of one foreground region, as traced in the mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    /// Enclosed area of the boundary polygon (shoelace formula).
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
            })
            .sum();
        twice.abs() as f64 * 0.5
    }

    /// Length of the closed boundary.
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                let dx = (b.x - a.x) as f64;
                let dy = (b.y - a.y) as f64;
                dx.hypot(dy)
            })
            .sum()
    }
}

/// Geometric descriptor of the dominant finger-contact shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSet {
    pub area: f64,
    pub perimeter: f64,
    /// `4π·area / perimeter²`; 1.0 for a perfect circle, 0 when perimeter is 0.
    pub circularity: f64,
}

impl FeatureSet {
    pub fn new(area: f64, perimeter: f64, circularity: f64) -> Self {
        Self {
            area,
            perimeter,
            circularity,
        }
    }

    /// Derive circularity from area and perimeter.
    pub fn from_shape(area: f64, perimeter: f64) -> Self {
        let circularity = if perimeter > 0.0 {
            4.0 * PI * area / (perimeter * perimeter)
        } else {
            0.0
        };
        Self::new(area, perimeter, circularity)
    }

    pub fn from_contour(contour: &Contour) -> Self {
        Self::from_shape(contour.area(), contour.perimeter())
    }

    /// All components finite and area/perimeter non-negative.
    pub fn is_valid(&self) -> bool {
        [self.area, self.perimeter, self.circularity]
            .iter()
            .all(|v| v.is_finite())
            && self.area >= 0.0
            && self.perimeter >= 0.0
            && self.circularity >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square(side: i32) -> Contour {
        let mut points = Vec::new();
        for x in 0..side {
            points.push(Point::new(x, 0));
        }
        for y in 1..side {
            points.push(Point::new(side - 1, y));
        }
        for x in (0..side - 1).rev() {
            points.push(Point::new(x, side - 1));
        }
        for y in (1..side - 1).rev() {
            points.push(Point::new(0, y));
        }
        Contour::new(points)
    }

    #[test]
    fn square_area_and_perimeter() {
        let c = square(10);
        assert_abs_diff_eq!(c.area(), 81.0);
        assert_abs_diff_eq!(c.perimeter(), 36.0);
    }

    #[test]
    fn degenerate_contours_have_zero_measures() {
        let single = Contour::new(vec![Point::new(3, 4)]);
        assert_eq!(single.area(), 0.0);
        assert_eq!(single.perimeter(), 0.0);

        let f = FeatureSet::from_contour(&single);
        assert_eq!(f.circularity, 0.0);
        assert!(f.is_valid());
    }

    #[test]
    fn circularity_of_exact_circle_is_one() {
        let r: f64 = 12.0;
        let f = FeatureSet::from_shape(PI * r * r, 2.0 * PI * r);
        assert_abs_diff_eq!(f.circularity, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn from_gray_normalises_foreground() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([x as u8 * 7]));
        let mask = Mask::from_gray(gray);
        assert!(!mask.is_foreground(0, 0));
        assert_eq!(mask.as_image().get_pixel(1, 0)[0], FOREGROUND);
        assert_eq!(mask.foreground_count(), 2);
    }
}
