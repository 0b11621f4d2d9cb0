//! Values produced by evaluating expression nodes.

use image::GrayImage;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Value types that may be drawn as the result of a tree node.
///
/// Every value can be drawn as text via its `Display` impl. Values with a 2-D shape may also
/// provide a grayscale image of themselves.
pub trait Visual: Clone + fmt::Display {
    /// A grayscale rendering of the value, if it has a 2-D shape.
    fn as_image(&self) -> Option<GrayImage> {
        None
    }

    /// Whether the value should be drawn as an image rather than as text.
    fn is_image(&self) -> bool {
        self.as_image().is_some()
    }
}

/// A row-major 2-D array of samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

/// A grayscale image value, for primitive sets that operate on images directly.
#[derive(Clone, Debug, PartialEq)]
pub struct Grayscale(pub GrayImage);

/// A dynamically typed value, for primitive sets mixing scalars and arrays.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Matrix(Matrix),
}

impl Matrix {
    /// Returns `None` if `data` does not hold exactly `rows * cols` samples.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        if rows.checked_mul(cols)? != data.len() {
            return None;
        }
        Some(Matrix { rows, cols, data })
    }

    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Matrix { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    /// Apply `f` to every sample.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        let data = self.data.iter().map(|&x| f(x)).collect();
        Matrix { rows: self.rows, cols: self.cols, data }
    }

    /// Combine two matrices of the same shape sample by sample.
    pub fn zip_with<F>(&self, other: &Matrix, f: F) -> Option<Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.rows != other.rows || self.cols != other.cols {
            return None;
        }
        let data = self.data.iter().zip(&other.data).map(|(&a, &b)| f(a, b)).collect();
        Some(Matrix { rows: self.rows, cols: self.cols, data })
    }

    /// Scale the samples linearly so that the smallest is black and the largest is white.
    ///
    /// A matrix whose samples are all equal is black.
    pub fn to_gray_image(&self) -> GrayImage {
        let (min, max) = self
            .data
            .iter()
            .filter(|x| x.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        let range = max - min;
        let pixels = self
            .data
            .iter()
            .map(|&x| {
                if !x.is_finite() || range <= 0.0 {
                    0
                } else {
                    (((x - min) / range) * 255.0).round() as u8
                }
            })
            .collect();
        // The buffer length always matches the dimensions.
        GrayImage::from_raw(self.cols as u32, self.rows as u32, pixels)
            .unwrap_or_else(|| GrayImage::new(self.cols as u32, self.rows as u32))
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}x{} matrix]", self.rows, self.cols)
    }
}

impl fmt::Display for Grayscale {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (w, h) = self.0.dimensions();
        write!(f, "[{}x{} image]", w, h)
    }
}

impl From<GrayImage> for Grayscale {
    fn from(image: GrayImage) -> Self {
        Grayscale(image)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Matrix(ref m) => write!(f, "{}", m),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Matrix> for Value {
    fn from(m: Matrix) -> Self {
        Value::Matrix(m)
    }
}

impl Visual for Value {
    fn as_image(&self) -> Option<GrayImage> {
        match *self {
            Value::Matrix(ref m) => Some(m.to_gray_image()),
            _ => None,
        }
    }

    fn is_image(&self) -> bool {
        matches!(*self, Value::Matrix(_))
    }
}

impl Visual for Matrix {
    fn as_image(&self) -> Option<GrayImage> {
        Some(self.to_gray_image())
    }

    fn is_image(&self) -> bool {
        true
    }
}

impl Visual for Grayscale {
    fn as_image(&self) -> Option<GrayImage> {
        Some(self.0.clone())
    }

    fn is_image(&self) -> bool {
        true
    }
}

impl Visual for i64 {}
impl Visual for f64 {}
impl Visual for bool {}

/// Save the image representation of `value` to `path` at full resolution.
///
/// The format is chosen from the path's extension.
pub fn save_image<V: Visual>(value: &V, path: impl AsRef<Path>) -> Result<()> {
    let image = value.as_image().ok_or_else(|| Error::NoImage(value.to_string()))?;
    image.save(path.as_ref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_shape_must_match_data() {
        assert!(Matrix::new(2, 3, vec![0.0; 6]).is_some());
        assert!(Matrix::new(2, 3, vec![0.0; 5]).is_none());
    }

    #[test]
    fn gray_image_spans_full_range() {
        let m = Matrix::new(1, 3, vec![-1.0, 0.0, 1.0]).unwrap();
        let img = m.to_gray_image();
        assert_eq!(img.dimensions(), (3, 1));
        let pixels: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        assert_eq!(pixels, [0, 128, 255]);
    }

    #[test]
    fn constant_matrix_is_black() {
        let m = Matrix::from_fn(2, 2, |_, _| 4.0);
        assert!(m.to_gray_image().pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn only_matrices_are_images() {
        assert!(Value::from(Matrix::from_fn(2, 2, |r, c| (r + c) as f64)).is_image());
        assert!(!Value::Int(3).is_image());
        assert!(!7_i64.is_image());
        assert_eq!(Value::Int(10).to_string(), "10");
    }

    #[test]
    fn grayscale_values_are_images_as_is() {
        let image = GrayImage::from_fn(3, 2, |x, y| image::Luma([(x * 10 + y) as u8]));
        let value = Grayscale::from(image.clone());
        assert!(value.is_image());
        assert_eq!(value.as_image(), Some(image));
        assert_eq!(value.to_string(), "[3x2 image]");
    }

    #[test]
    fn save_image_writes_full_resolution_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.png");
        let m = Matrix::from_fn(4, 6, |r, c| (r * c) as f64);
        save_image(&m, &path).unwrap();
        let saved = image::open(&path).unwrap().to_luma8();
        assert_eq!(saved, m.to_gray_image());

        let err = save_image(&Value::Int(3), dir.path().join("n.png")).unwrap_err();
        assert!(matches!(err, Error::NoImage(ref v) if v == "3"));
        assert!(!dir.path().join("n.png").exists());
    }
}
