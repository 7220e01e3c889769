use image::{GrayImage, Luma};

use crate::error::{GraphError, Result};
use crate::types::Pixel;

/// Dense binary raster: the input boundary of the extraction core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRaster {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl BinaryRaster {
    /// An all-background raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_vec(width: u32, height: u32, data: Vec<bool>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(GraphError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Binarize a grayscale image: pixels brighter than `threshold` are foreground.
    pub fn from_gray(image: &GrayImage, threshold: u8) -> Self {
        let binary = imageproc::contrast::threshold(image, threshold);
        Self::from_gray_with(&binary, |v| v > 0)
    }

    /// Binarize with an arbitrary foreground predicate over the pixel value.
    pub fn from_gray_with<F>(image: &GrayImage, is_foreground: F) -> Self
    where
        F: Fn(u8) -> bool,
    {
        let data = image.pixels().map(|p| is_foreground(p[0])).collect();
        Self {
            width: image.width(),
            height: image.height(),
            data,
        }
    }

    /// Pixels outside the raster are ignored.
    pub fn from_pixels(width: u32, height: u32, pixels: impl IntoIterator<Item = Pixel>) -> Self {
        let mut raster = Self::new(width, height);
        for p in pixels {
            raster.set(p.x, p.y, true);
        }
        raster
    }

    /// Build from ASCII rows; `#`, `1`, `x`, `X` and `*` are foreground.
    ///
    /// Rows may differ in length; the raster is as wide as the longest row.
    pub fn from_rows(rows: &[&str]) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
        let mut raster = Self::new(width, rows.len() as u32);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if matches!(c, '#' | '1' | 'x' | 'X' | '*') {
                    raster.set(x as i32, y as i32, true);
                }
            }
        }
        raster
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Zero width or height.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    pub(crate) fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y)
            .then(|| y as usize * self.width as usize + x as usize)
    }

    /// Out-of-bounds coordinates read as background.
    pub fn get(&self, x: i32, y: i32) -> bool {
        self.index(x, y).map(|i| self.data[i]).unwrap_or(false)
    }

    pub fn is_foreground(&self, p: Pixel) -> bool {
        self.get(p.x, p.y)
    }

    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = value;
        }
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Foreground pixels in raster order.
    pub fn foreground_pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        let width = self.width as usize;
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v)
            .map(move |(i, _)| Pixel::new((i % width) as i32, (i / width) as i32))
    }

    pub(crate) fn data(&self) -> &[bool] {
        &self.data
    }

    /// Foreground as 255, background as 0.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x as i32, y as i32) { 255u8 } else { 0u8 }])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let raster = BinaryRaster::from_rows(&["#..", ".#", "..#"]);
        assert_eq!(raster.width(), 3);
        assert_eq!(raster.height(), 3);
        assert_eq!(raster.foreground_count(), 3);
        assert!(raster.get(1, 1));
        assert!(!raster.get(2, 1));
        assert!(!raster.get(-1, 0));
    }

    #[test]
    fn test_from_gray_threshold() {
        let mut img = GrayImage::new(4, 4);
        img.put_pixel(1, 1, Luma([200u8]));
        img.put_pixel(2, 2, Luma([100u8]));

        let raster = BinaryRaster::from_gray(&img, 128);
        assert_eq!(raster.foreground_pixels().collect::<Vec<_>>(), vec![Pixel::new(1, 1)]);

        let dark = BinaryRaster::from_gray_with(&img, |v| v == 0);
        assert_eq!(dark.foreground_count(), 14);
    }

    #[test]
    fn test_size_mismatch() {
        let err = BinaryRaster::from_vec(3, 3, vec![true; 8]).unwrap_err();
        assert!(matches!(err, GraphError::SizeMismatch { expected: 9, actual: 8 }));
    }

    #[test]
    fn test_gray_round_trip_preserves_foreground() {
        let raster = BinaryRaster::from_rows(&["##.", "..#"]);
        let back = BinaryRaster::from_gray(&raster.to_gray(), 128);
        assert_eq!(back, raster);
    }
}
