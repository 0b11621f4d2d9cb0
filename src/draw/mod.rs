//! Drawing evaluated expression trees.
//!
//! A `Drawer` evaluates a tree for some inputs, then walks it from the root adding every node
//! to a `Canvas`. How each node's value is drawn is decided by a `RuleSet`: an ordered list of
//! `(predicate, action)` pairs where the most recently registered rule whose predicate matches
//! the node wins.

use image::GrayImage;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::gp::expr::{Arity, Node, NodeId, Tree};
use crate::gp::value::Visual;

pub mod canvas;

pub use self::canvas::{Canvas, GraphCanvas};

/// Decides whether a rule applies to a node.
pub type Predicate<V> = Box<dyn Fn(&Node<V>) -> bool>;

/// Draws a node's value onto the canvas.
pub type Action<V> = Box<dyn Fn(&mut dyn Canvas, &Node<V>) -> Result<()>>;

/// A single render rule.
pub struct Rule<V> {
    predicate: Predicate<V>,
    action: Action<V>,
}

/// An ordered collection of render rules. Later rules override earlier ones.
pub struct RuleSet<V> {
    rules: Vec<Rule<V>>,
}

/// The direction in which the layout program ranks the tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RankDir {
    TopToBottom,
    BottomToTop,
    LeftToRight,
    RightToLeft,
}

/// Parameters for drawing and saving graphs.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawOptions {
    /// The Graphviz program used to lay out and rasterize non-DOT outputs.
    pub layout_program: String,
    /// Where embedded images are written. Defaults to a directory beside the output.
    pub image_dir: Option<PathBuf>,
    /// The length in pixels of the longest side of each embedded image.
    pub thumbnail_px: u32,
    /// The size in inches of the box each embedded image is drawn in.
    pub thumbnail_inches: f32,
    pub rank_dir: RankDir,
}

/// Draws expression trees for concrete inputs.
pub struct Drawer<V> {
    rules: RuleSet<V>,
    options: DrawOptions,
}

// Work remaining while walking a tree onto a canvas.
enum Step<'a, V> {
    Visit(&'a Node<V>),
    Edge(NodeId, NodeId),
}

impl RankDir {
    pub fn as_str(&self) -> &'static str {
        match *self {
            RankDir::TopToBottom => "TB",
            RankDir::BottomToTop => "BT",
            RankDir::LeftToRight => "LR",
            RankDir::RightToLeft => "RL",
        }
    }
}

impl Default for DrawOptions {
    fn default() -> Self {
        DrawOptions {
            layout_program: "dot".to_string(),
            image_dir: None,
            thumbnail_px: 128,
            thumbnail_inches: 2.0,
            rank_dir: RankDir::TopToBottom,
        }
    }
}

impl DrawOptions {
    pub fn layout_program(mut self, program: impl Into<String>) -> Self {
        self.layout_program = program.into();
        self
    }

    pub fn image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = Some(dir.into());
        self
    }

    pub fn thumbnail_px(mut self, px: u32) -> Self {
        self.thumbnail_px = px;
        self
    }

    pub fn thumbnail_inches(mut self, inches: f32) -> Self {
        self.thumbnail_inches = inches;
        self
    }

    pub fn rank_dir(mut self, rank_dir: RankDir) -> Self {
        self.rank_dir = rank_dir;
        self
    }
}

impl<V> RuleSet<V> {
    /// A rule set without any rules. Nothing can be drawn until a rule is registered.
    pub fn empty() -> Self {
        RuleSet { rules: vec![] }
    }

    /// Append a rule, taking precedence over all rules registered before it.
    pub fn register<P, A>(&mut self, predicate: P, action: A) -> &mut Self
    where
        P: Fn(&Node<V>) -> bool + 'static,
        A: Fn(&mut dyn Canvas, &Node<V>) -> Result<()> + 'static,
    {
        let rule = Rule { predicate: Box::new(predicate), action: Box::new(action) };
        self.rules.push(rule);
        self
    }

    /// Remove every rule, including the defaults.
    pub fn clear_defaults(&mut self) -> &mut Self {
        self.rules.clear();
        self
    }

    /// The action of the most recently registered rule that matches the node.
    pub fn resolve(&self, node: &Node<V>) -> Result<&Action<V>> {
        self.rules
            .iter()
            .rev()
            .find(|rule| (rule.predicate)(node))
            .map(|rule| &rule.action)
            .ok_or(Error::NoMatchingRule { node: node.id() })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<V: Visual + 'static> RuleSet<V> {
    /// A rule set holding the default rules, in order of increasing precedence:
    ///
    /// 1. Every node's value is drawn as text.
    /// 2. Values that look like images are drawn as images.
    /// 3. Terminals that aren't arguments (i.e. constants) draw nothing.
    pub fn new() -> Self {
        let mut rules = Self::empty();
        rules
            .register(|_| true, draw_text)
            .register(|node| node.value().map_or(false, |v| v.is_image()), draw_image)
            .register(|node| node.arity() == 0 && !node.is_argument(), draw_nothing);
        rules
    }
}

impl<V: Visual + 'static> Default for RuleSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for RuleSet<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RuleSet").field("rules", &self.rules.len()).finish()
    }
}

impl<V: Visual + 'static> Drawer<V> {
    /// A drawer using the default rules and options.
    pub fn new() -> Self {
        Self::with_options(DrawOptions::default())
    }

    /// A drawer using the default rules.
    pub fn with_options(options: DrawOptions) -> Self {
        Drawer { rules: RuleSet::new(), options }
    }
}

impl<V: Visual + 'static> Default for Drawer<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Visual> Drawer<V> {
    /// Register a rule that takes precedence over all rules registered before it.
    pub fn register<P, A>(&mut self, predicate: P, action: A) -> &mut Self
    where
        P: Fn(&Node<V>) -> bool + 'static,
        A: Fn(&mut dyn Canvas, &Node<V>) -> Result<()> + 'static,
    {
        self.rules.register(predicate, action);
        self
    }

    /// Remove every rule, including the defaults.
    pub fn clear_defaults(&mut self) -> &mut Self {
        self.rules.clear_defaults();
        self
    }

    pub fn rules(&self) -> &RuleSet<V> {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleSet<V> {
        &mut self.rules
    }

    pub fn options(&self) -> &DrawOptions {
        &self.options
    }

    /// Evaluate `tree` for the given inputs and draw it onto `canvas`.
    ///
    /// Every node is added to the canvas labelled with its primitive's name, its value is
    /// drawn by the action of the winning rule, and an edge is added from each node to each of
    /// its children.
    #[instrument(level = "debug", skip_all, fields(nodes = tree.len()))]
    pub fn draw(&self, canvas: &mut dyn Canvas, tree: &mut Tree<V>, args: &[V]) -> Result<()> {
        tree.evaluate(args)?;
        let mut stack = vec![Step::Visit(tree.root())];
        while let Some(step) = stack.pop() {
            match step {
                Step::Visit(node) => {
                    canvas.add_node(node.id(), node.name());
                    let action = self.rules.resolve(node)?;
                    action(&mut *canvas, node)?;
                    // Each child's subtree is drawn before the edge leading to it.
                    for child in node.children().iter().rev() {
                        stack.push(Step::Edge(node.id(), child.id()));
                        stack.push(Step::Visit(child));
                    }
                }
                Step::Edge(parent, child) => canvas.add_edge(parent, child),
            }
        }
        Ok(())
    }

    /// Evaluate `tree` for the given inputs and draw it onto a new `GraphCanvas`.
    pub fn get_graph(&self, tree: &mut Tree<V>, args: &[V]) -> Result<GraphCanvas> {
        let mut canvas = GraphCanvas::new(self.options.clone());
        self.draw(&mut canvas, tree, args)?;
        Ok(canvas)
    }

    /// Evaluate `tree` for the given inputs, draw it and save the result to `path`.
    pub fn save_graph<P>(&self, path: P, tree: &mut Tree<V>, args: &[V]) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let canvas = self.get_graph(tree, args)?;
        canvas.save(path)?;
        info!(path = %path.display(), nodes = canvas.node_count(), "saved tree graph");
        Ok(())
    }
}

impl<V> fmt::Debug for Drawer<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Drawer")
            .field("rules", &self.rules)
            .field("options", &self.options)
            .finish()
    }
}

/// Label the node with its value as text.
pub fn draw_text<V: Visual>(canvas: &mut dyn Canvas, node: &Node<V>) -> Result<()> {
    let value = node.value().ok_or(Error::NotEvaluated(node.id()))?;
    canvas.label(node.id(), &value.to_string());
    Ok(())
}

/// Draw the node's value as an image.
pub fn draw_image<V: Visual>(canvas: &mut dyn Canvas, node: &Node<V>) -> Result<()> {
    let value = node.value().ok_or(Error::NotEvaluated(node.id()))?;
    let image: GrayImage = value.as_image().ok_or(Error::NotAnImage(node.id()))?;
    debug!(node = %node.id(), dimensions = ?image.dimensions(), "embedding image");
    canvas.embed_image(node.id(), &image);
    Ok(())
}

/// Draw nothing for the node's value.
pub fn draw_nothing<V>(_canvas: &mut dyn Canvas, _node: &Node<V>) -> Result<()> {
    Ok(())
}
