//! The surface that trees are drawn onto.

use fnv::FnvHashMap;
use image::imageops::{self, FilterType};
use image::GrayImage;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, instrument};

use super::DrawOptions;
use crate::error::{Error, Result};
use crate::gp::expr::NodeId;

/// A graph-drawing backend.
///
/// Tree nodes are added with the name of their primitive; render actions then attach a result
/// (text or an image) to them.
pub trait Canvas {
    /// Add a tree node with the given label.
    fn add_node(&mut self, node: NodeId, label: &str);
    /// Connect a tree node to one of its children.
    fn add_edge(&mut self, parent: NodeId, child: NodeId);
    /// Attach text to a tree node, replacing any result it already has.
    fn label(&mut self, node: NodeId, text: &str);
    /// Attach an image to a tree node, replacing any result it already has.
    fn embed_image(&mut self, node: NodeId, image: &GrayImage);
    /// Serialize the canvas to the given path.
    fn save(&self, path: &Path) -> Result<()>;
}

/// An in-memory graph that serializes to Graphviz DOT.
///
/// Paths ending in `.dot` or `.gv` (or without an extension) receive the DOT source. Any
/// other extension is used as the output format of the configured layout program, e.g.
/// `tree.png` is rendered with `dot -Tpng -o tree.png`.
#[derive(Clone, Debug)]
pub struct GraphCanvas {
    graph: DiGraph<Element, Link, u32>,
    operators: FnvHashMap<NodeId, NodeIndex<u32>>,
    results: FnvHashMap<NodeId, NodeIndex<u32>>,
    options: DrawOptions,
}

#[derive(Clone, Debug)]
enum Element {
    Operator { id: NodeId, label: String },
    Text { of: NodeId, text: String },
    Image { of: NodeId, image: GrayImage },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Link {
    Child,
    Result,
}

impl GraphCanvas {
    pub fn new(options: DrawOptions) -> Self {
        GraphCanvas {
            graph: DiGraph::default(),
            operators: FnvHashMap::default(),
            results: FnvHashMap::default(),
            options,
        }
    }

    /// The number of tree nodes on the canvas.
    pub fn node_count(&self) -> usize {
        self.operators.len()
    }

    /// The number of parent-child edges on the canvas.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_weights().filter(|&&l| l == Link::Child).count()
    }

    /// The label given to the tree node when it was added.
    pub fn node_label(&self, node: NodeId) -> Option<&str> {
        match self.operators.get(&node).map(|&ix| &self.graph[ix]) {
            Some(Element::Operator { label, .. }) => Some(label.as_str()),
            _ => None,
        }
    }

    /// The text attached to the tree node, if its result was drawn as text.
    pub fn text_of(&self, node: NodeId) -> Option<&str> {
        match self.results.get(&node).map(|&ix| &self.graph[ix]) {
            Some(Element::Text { text, .. }) => Some(text.as_str()),
            _ => None,
        }
    }

    /// The image attached to the tree node, if its result was drawn as an image.
    pub fn image_of(&self, node: NodeId) -> Option<&GrayImage> {
        match self.results.get(&node).map(|&ix| &self.graph[ix]) {
            Some(Element::Image { image, .. }) => Some(image),
            _ => None,
        }
    }

    /// Whether anything was drawn for the tree node's result.
    pub fn has_result(&self, node: NodeId) -> bool {
        self.results.contains_key(&node)
    }

    /// The DOT source of the canvas, referencing images within the given directory.
    pub fn to_dot(&self, image_dir: &Path) -> String {
        let mut dot = String::new();
        // Writing to a `String` never fails.
        let _ = self.write_dot(&mut dot, image_dir);
        dot
    }

    fn write_dot(&self, dot: &mut String, image_dir: &Path) -> std::fmt::Result {
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "    rankdir={};", self.options.rank_dir.as_str())?;
        for ix in self.graph.node_indices() {
            match self.graph[ix] {
                Element::Operator { id, ref label } => {
                    writeln!(dot, "    {} [label=\"{}\"];", operator_key(id), escape(label))?;
                }
                Element::Text { of, ref text } => {
                    writeln!(
                        dot,
                        "    {} [label=\"{}\", shape=plaintext];",
                        result_key(of),
                        escape(text)
                    )?;
                }
                Element::Image { of, .. } => {
                    let path = image_dir.join(image_file(of));
                    let inches = self.options.thumbnail_inches;
                    writeln!(
                        dot,
                        "    {} [label=\"\", image=\"{}\", imagescale=true, fixedsize=true, \
                         shape=plaintext, width={}, height={}];",
                        result_key(of),
                        escape(&path.display().to_string()),
                        inches,
                        inches
                    )?;
                }
            }
        }
        for e in self.graph.edge_references() {
            let (a, b) = (self.key(e.source()), self.key(e.target()));
            match *e.weight() {
                Link::Child => writeln!(dot, "    {} -> {} [dir=back];", a, b)?,
                Link::Result => {
                    writeln!(dot, "    {} -> {} [style=invis, dir=both];", a, b)?;
                    writeln!(dot, "    {{ rank=same; {}; {}; }}", a, b)?;
                }
            }
        }
        writeln!(dot, "}}")
    }

    fn key(&self, ix: NodeIndex<u32>) -> String {
        match self.graph[ix] {
            Element::Operator { id, .. } => operator_key(id),
            Element::Text { of, .. } | Element::Image { of, .. } => result_key(of),
        }
    }

    /// Where embedded images are written for an output at `path`.
    pub fn image_dir(&self, path: &Path) -> PathBuf {
        if let Some(ref dir) = self.options.image_dir {
            return dir.clone();
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("graph");
        path.with_file_name(format!("{}_images", stem))
    }

    fn operator(&mut self, id: NodeId) -> NodeIndex<u32> {
        if let Some(&ix) = self.operators.get(&id) {
            return ix;
        }
        let label = id.0.to_string();
        let ix = self.graph.add_node(Element::Operator { id, label });
        self.operators.insert(id, ix);
        ix
    }

    fn set_result(&mut self, node: NodeId, element: Element) {
        if let Some(&ix) = self.results.get(&node) {
            self.graph[ix] = element;
            return;
        }
        let op = self.operator(node);
        let ix = self.graph.add_node(element);
        self.graph.add_edge(op, ix, Link::Result);
        self.results.insert(node, ix);
    }

    fn write_images(&self, dir: &Path) -> Result<()> {
        let size = self.options.thumbnail_px.max(1);
        let mut created = false;
        for element in self.graph.node_weights() {
            if let Element::Image { of, ref image } = *element {
                if !created {
                    fs::create_dir_all(dir)?;
                    created = true;
                }
                let (w, h) = image.dimensions();
                let scale = size as f32 / w.max(h).max(1) as f32;
                let (tw, th) = (
                    ((w as f32 * scale).round() as u32).max(1),
                    ((h as f32 * scale).round() as u32).max(1),
                );
                let thumbnail = imageops::resize(image, tw, th, FilterType::Nearest);
                thumbnail.save(dir.join(image_file(of)))?;
            }
        }
        Ok(())
    }

    fn run_layout(&self, dot: &str, format: &str, path: &Path) -> Result<()> {
        let program = &self.options.layout_program;
        let mut child = Command::new(program)
            .arg(format!("-T{}", format))
            .arg("-o")
            .arg(path)
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        // Stdin is closed at the end of this match, before waiting on the program.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(dot.as_bytes()),
            None => Ok(()),
        };
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let status = if stderr.is_empty() { output.status.to_string() } else { stderr };
            return Err(Error::Layout {
                program: program.clone(),
                path: path.to_path_buf(),
                status,
            });
        }
        match written {
            // The program finished successfully without reading all of its input.
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!(program = %program, "layout program closed its input early");
                Ok(())
            }
            written => Ok(written?),
        }
    }
}

impl Default for GraphCanvas {
    fn default() -> Self {
        Self::new(DrawOptions::default())
    }
}

impl Canvas for GraphCanvas {
    fn add_node(&mut self, node: NodeId, label: &str) {
        let ix = self.operator(node);
        self.graph[ix] = Element::Operator { id: node, label: label.to_string() };
    }

    fn add_edge(&mut self, parent: NodeId, child: NodeId) {
        let (a, b) = (self.operator(parent), self.operator(child));
        self.graph.add_edge(a, b, Link::Child);
    }

    fn label(&mut self, node: NodeId, text: &str) {
        self.set_result(node, Element::Text { of: node, text: text.to_string() });
    }

    fn embed_image(&mut self, node: NodeId, image: &GrayImage) {
        self.set_result(node, Element::Image { of: node, image: image.clone() });
    }

    #[instrument(level = "debug", skip(self), fields(nodes = self.node_count()))]
    fn save(&self, path: &Path) -> Result<()> {
        let image_dir = self.image_dir(path);
        self.write_images(&image_dir)?;
        let dot = self.to_dot(&image_dir);
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match format.as_deref() {
            None | Some("dot") | Some("gv") => fs::write(path, dot)?,
            Some(format) => {
                debug!(program = %self.options.layout_program, format, "running layout");
                self.run_layout(&dot, format, path)?;
            }
        }
        Ok(())
    }
}

fn operator_key(id: NodeId) -> String {
    format!("n{}", id.0)
}

fn result_key(id: NodeId) -> String {
    format!("n{}_result", id.0)
}

fn image_file(id: NodeId) -> String {
    format!("n{}.png", id.0)
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_replace_earlier_results() {
        let mut canvas = GraphCanvas::default();
        canvas.add_node(NodeId(0), "add");
        canvas.label(NodeId(0), "1");
        canvas.label(NodeId(0), "2");
        assert_eq!(canvas.text_of(NodeId(0)), Some("2"));
        canvas.embed_image(NodeId(0), &GrayImage::new(2, 2));
        assert!(canvas.text_of(NodeId(0)).is_none());
        assert!(canvas.image_of(NodeId(0)).is_some());
        assert_eq!(canvas.node_count(), 1);
        assert_eq!(canvas.edge_count(), 0);
    }

    #[test]
    fn dot_keeps_results_beside_their_node() {
        let mut canvas = GraphCanvas::default();
        canvas.add_node(NodeId(0), "neg");
        canvas.add_node(NodeId(1), "x");
        canvas.add_edge(NodeId(0), NodeId(1));
        canvas.label(NodeId(0), "say \"hi\"");
        let dot = canvas.to_dot(Path::new("images"));
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("n0 [label=\"neg\"];"));
        assert!(dot.contains("n0 -> n1 [dir=back];"));
        assert!(dot.contains("n0_result [label=\"say \\\"hi\\\"\", shape=plaintext];"));
        assert!(dot.contains("{ rank=same; n0; n0_result; }"));
    }

    #[test]
    fn image_dir_defaults_beside_output() {
        let canvas = GraphCanvas::default();
        let dir = canvas.image_dir(Path::new("out/tree.png"));
        assert_eq!(dir, Path::new("out/tree_images"));
    }
}
