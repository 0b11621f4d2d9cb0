//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use gptree::{Canvas, Matrix, NodeId, PrimitiveSet, Result, Value};
use image::GrayImage;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Integer arithmetic over two arguments, `x` and `y`.
pub fn arithmetic() -> PrimitiveSet<i64> {
    let mut pset = PrimitiveSet::new("MAIN");
    pset.add_primitive("add", 2, |xs: &[i64]| Ok(xs[0] + xs[1]))
        .unwrap()
        .add_primitive("sub", 2, |xs: &[i64]| Ok(xs[0] - xs[1]))
        .unwrap()
        .add_primitive("mul", 2, |xs: &[i64]| Ok(xs[0] * xs[1]))
        .unwrap()
        .add_primitive("div", 2, |xs: &[i64]| {
            if xs[1] == 0 {
                anyhow::bail!("division by zero");
            }
            Ok(xs[0] / xs[1])
        })
        .unwrap()
        .add_primitive("neg", 1, |xs: &[i64]| Ok(-xs[0]))
        .unwrap()
        .add_primitive("if_pos", 3, |xs: &[i64]| Ok(if xs[0] > 0 { xs[1] } else { xs[2] }))
        .unwrap()
        .add_argument("x")
        .unwrap()
        .add_argument("y")
        .unwrap()
        .add_terminal("3", 3)
        .unwrap()
        .add_terminal("1", 1)
        .unwrap();
    pset
}

/// Image operations over a single image argument.
pub fn imaging() -> PrimitiveSet<Value> {
    fn matrix(v: &Value) -> anyhow::Result<&Matrix> {
        match *v {
            Value::Matrix(ref m) => Ok(m),
            ref other => anyhow::bail!("expected a matrix, found {}", other),
        }
    }
    fn float(v: &Value) -> anyhow::Result<f64> {
        match *v {
            Value::Float(x) => Ok(x),
            Value::Int(i) => Ok(i as f64),
            ref other => anyhow::bail!("expected a number, found {}", other),
        }
    }

    let mut pset = PrimitiveSet::with_arguments("IMAGE", 1);
    pset.add_primitive("invert", 1, |xs: &[Value]| {
        Ok(Value::Matrix(matrix(&xs[0])?.map(|p| 1.0 - p)))
    })
    .unwrap()
    .add_primitive("scale", 2, |xs: &[Value]| {
        let k = float(&xs[1])?;
        Ok(Value::Matrix(matrix(&xs[0])?.map(|p| p * k)))
    })
    .unwrap()
    .add_primitive("mean", 1, |xs: &[Value]| {
        let m = matrix(&xs[0])?;
        let mut sum = 0.0;
        for r in 0..m.rows() {
            for c in 0..m.cols() {
                sum += m.get(r, c).unwrap_or(0.0);
            }
        }
        Ok(Value::Float(sum / (m.rows() * m.cols()).max(1) as f64))
    })
    .unwrap()
    .add_terminal("2", Value::Float(2.0))
    .unwrap()
    .rename_argument("ARG0", "img")
    .unwrap();
    pset
}

pub fn gradient(rows: usize, cols: usize) -> Value {
    Value::Matrix(Matrix::from_fn(rows, cols, |r, c| (r * cols + c) as f64))
}

/// A canvas that records every call made on it.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub nodes: Vec<(NodeId, String)>,
    pub edges: Vec<(NodeId, NodeId)>,
    pub labels: Vec<(NodeId, String)>,
    pub images: Vec<(NodeId, (u32, u32))>,
    pub saved: RefCell<Vec<PathBuf>>,
}

impl RecordingCanvas {
    pub fn label_of(&self, node: NodeId) -> Option<&str> {
        self.labels
            .iter()
            .rev()
            .find(|(id, _)| *id == node)
            .map(|(_, text)| text.as_str())
    }

    pub fn drew_anything_for(&self, node: NodeId) -> bool {
        self.labels.iter().any(|(id, _)| *id == node) || self.images.iter().any(|(id, _)| *id == node)
    }
}

impl Canvas for RecordingCanvas {
    fn add_node(&mut self, node: NodeId, label: &str) {
        self.nodes.push((node, label.to_string()));
    }

    fn add_edge(&mut self, parent: NodeId, child: NodeId) {
        self.edges.push((parent, child));
    }

    fn label(&mut self, node: NodeId, text: &str) {
        self.labels.push((node, text.to_string()));
    }

    fn embed_image(&mut self, node: NodeId, image: &GrayImage) {
        self.images.push((node, image.dimensions()));
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.saved.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
}

/// Route `tracing` output through the test harness. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
