//! Items related to expressions.
//!
//! An expression arrives as a flat, prefix-ordered stream of tokens, each naming a primitive
//! within a `PrimitiveSet`. `Tree::of` rebuilds the tree that the stream describes, using the
//! arity of each primitive to decide how many of the following sub-expressions belong to it.

use fnv::FnvHashMap;
use std::convert::Infallible;
use std::fmt;
use std::mem;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use super::pset::{Primitive, PrimitiveSet};
use crate::error::{Error, Result, StructureError};

/// A node/expression type that can be evaluated to a single value.
pub trait Evaluate<E: ?Sized> {
    /// The type of the value produced by the node type.
    type Value;
    /// Evaluate this node in terms of the values of its children and the environment.
    fn evaluate(&self, inputs: &[Self::Value], env: &E) -> Result<Self::Value>;
}

/// Node types that know their number of inputs / arguments.
pub trait Arity {
    /// The number of children the node consumes.
    ///
    /// Function nodes will usually return 1 or more. Terminal nodes will return 0.
    fn arity(&self) -> usize;
}

/// Identifies a node within its tree.
///
/// This is the position of the node's token within the prefix-ordered stream the tree was
/// built from, so it is also the node's index in a preorder traversal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// A single primitive application along with its children.
///
/// Trees may be arbitrarily deep, so every walk over a node's descendants (evaluation,
/// formatting, cloning, comparison and dropping) uses an explicit stack.
#[derive(Debug)]
pub struct Node<V> {
    id: NodeId,
    primitive: Arc<Primitive<V>>,
    children: Vec<Node<V>>,
    value: Option<V>,
}

/// An expression tree reconstructed from a prefix-ordered token stream.
///
/// The value of every node is recorded by `Tree::evaluate` and overwritten by each subsequent
/// evaluation. Evaluation requires `&mut self`, so a single tree can only be evaluated for
/// one set of inputs at a time.
#[derive(Clone, Debug)]
pub struct Tree<V> {
    root: Node<V>,
}

/// A preorder iterator over the nodes of a tree.
pub struct Nodes<'a, V> {
    stack: Vec<&'a Node<V>>,
}

// A pending piece of a node's textual form.
enum Piece<'a, V> {
    Node(&'a Node<V>),
    Text(&'static str),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl<V> Node<V> {
    fn new(id: NodeId, primitive: Arc<Primitive<V>>) -> Self {
        let children = Vec::with_capacity(primitive.arity());
        Node { id, primitive, children, value: None }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn primitive(&self) -> &Primitive<V> {
        &self.primitive
    }

    pub fn name(&self) -> &str {
        self.primitive.name()
    }

    pub fn children(&self) -> &[Node<V>] {
        &self.children
    }

    /// The value produced by this node during the most recent evaluation.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Whether this node is a terminal standing in for an input value.
    pub fn is_argument(&self) -> bool {
        self.primitive.is_argument()
    }

    fn is_complete(&self) -> bool {
        self.children.len() == self.primitive.arity()
    }

    /// This node followed by all of its descendants in preorder.
    fn descendants(&self) -> Nodes<'_, V> {
        Nodes { stack: vec![self] }
    }

    /// Fold the subtree bottom-up: `visit` receives each node along with the results of its
    /// children, left to right, after all of those children have been visited.
    fn fold<T, E, F>(&self, mut visit: F) -> std::result::Result<T, E>
    where
        F: FnMut(&Node<V>, Vec<T>) -> std::result::Result<T, E>,
    {
        let mut stack: Vec<(&Node<V>, bool)> = self.children.iter().rev().map(|c| (c, false)).collect();
        let mut done: Vec<T> = vec![];
        while let Some((node, expanded)) = stack.pop() {
            if !expanded {
                stack.push((node, true));
                stack.extend(node.children.iter().rev().map(|c| (c, false)));
                continue;
            }
            // The results of a node's children are always the last ones pushed.
            let inputs = done.split_off(done.len() - node.children.len());
            done.push(visit(node, inputs)?);
        }
        visit(self, done)
    }

    fn call(&self, args: &[V]) -> Result<V>
    where
        V: Clone,
    {
        self.fold(|node, inputs| node.primitive.evaluate(&inputs, args))
    }

    fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(node.children.iter().map(|c| (c, level + 1)));
        }
        deepest
    }
}

impl<V: Clone> Clone for Node<V> {
    fn clone(&self) -> Self {
        let cloned = self.fold(|node, children| {
            Ok::<_, Infallible>(Node {
                id: node.id,
                primitive: node.primitive.clone(),
                children,
                value: node.value.clone(),
            })
        });
        match cloned {
            Ok(node) => node,
            Err(never) => match never {},
        }
    }
}

impl<V> Drop for Node<V> {
    fn drop(&mut self) {
        // Detach descendants first so that each node drops without any children.
        let mut stack = mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

impl<V> Arity for Node<V> {
    fn arity(&self) -> usize {
        self.primitive.arity()
    }
}

// Structural equality: the same primitives arranged the same way. Ids and values are ignored.
// The preorder sequence of (name, arity) pairs determines the shape, so comparing it is enough.
impl<V> PartialEq for Node<V> {
    fn eq(&self, other: &Self) -> bool {
        let same = |a: &Node<V>, b: &Node<V>| {
            Arc::ptr_eq(&a.primitive, &b.primitive) || (a.name() == b.name() && a.arity() == b.arity())
        };
        let (mut a, mut b) = (self.descendants(), other.descendants());
        loop {
            match (a.next(), b.next()) {
                (Some(x), Some(y)) if same(x, y) => continue,
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl<V> fmt::Display for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut stack = vec![Piece::Node(self)];
        while let Some(piece) = stack.pop() {
            let node = match piece {
                Piece::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Piece::Node(node) => node,
            };
            f.write_str(node.name())?;
            if node.children.is_empty() {
                continue;
            }
            f.write_str("(")?;
            stack.push(Piece::Text(")"));
            for (i, child) in node.children.iter().enumerate().rev() {
                stack.push(Piece::Node(child));
                if i > 0 {
                    stack.push(Piece::Text(", "));
                }
            }
        }
        Ok(())
    }
}

impl<V> Tree<V> {
    /// Reconstruct the tree described by the given prefix-ordered token stream.
    ///
    /// Each token is resolved to a primitive within `pset`. Nodes still awaiting children are
    /// kept on a stack; each new node is attached to the node at the top of the stack, and
    /// any node that has received all of its children is popped and attached to its own
    /// parent in turn.
    #[instrument(level = "debug", skip_all, fields(pset = pset.name()))]
    pub fn of<I>(tokens: I, pset: &PrimitiveSet<V>) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut pending: Vec<Node<V>> = vec![];
        let mut root: Option<Node<V>> = None;

        for (position, token) in tokens.into_iter().enumerate() {
            let token = token.as_ref();
            if root.is_some() {
                let token = token.to_string();
                return Err(StructureError::TrailingTokens { token, position }.into());
            }
            let primitive = match pset.get(token) {
                Some(p) => p.clone(),
                None => {
                    let token = token.to_string();
                    return Err(StructureError::UnknownToken { token, position }.into());
                }
            };

            // Attach the new node, then keep attaching each parent it completes.
            let mut next = Some(Node::new(NodeId(position), primitive));
            while let Some(node) = next.take() {
                if !node.is_complete() {
                    pending.push(node);
                    break;
                }
                match pending.pop() {
                    Some(mut parent) => {
                        parent.children.push(node);
                        next = Some(parent);
                    }
                    None => root = Some(node),
                }
            }
        }

        match root {
            Some(root) => {
                debug!(root = root.name(), "reconstructed tree");
                Ok(Tree { root })
            }
            None if pending.is_empty() => Err(StructureError::Empty.into()),
            None => Err(StructureError::Truncated { pending: pending.len() }.into()),
        }
    }

    /// Reconstruct a tree from its textual form, e.g. `add(x, neg(3))`.
    ///
    /// Parentheses, commas and whitespace only separate tokens; the structure is recovered
    /// from the arity of each primitive exactly as in `Tree::of`.
    pub fn parse(text: &str, pset: &PrimitiveSet<V>) -> Result<Self> {
        let tokens = text
            .split(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == ',')
            .filter(|s| !s.is_empty());
        Self::of(tokens, pset)
    }

    pub fn root(&self) -> &Node<V> {
        &self.root
    }

    /// All nodes of the tree in recursive depth-first (preorder) order.
    pub fn nodes(&self) -> Nodes<'_, V> {
        self.root.descendants()
    }

    /// Look up a node by its id.
    pub fn node(&self, id: NodeId) -> Option<&Node<V>> {
        // Ids are preorder positions.
        self.nodes().nth(id.0).filter(|n| n.id == id)
    }

    /// The prefix-ordered token stream this tree flattens to.
    pub fn tokens(&self) -> Vec<&str> {
        self.nodes().map(Node::name).collect()
    }

    /// The number of nodes within the tree.
    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    /// Always false; a tree has at least a root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The number of levels within the tree. A lone terminal has a depth of 1.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// The number of input values the tree reads: one more than its highest argument slot.
    pub fn required_arguments(&self) -> usize {
        self.nodes()
            .filter_map(|n| n.primitive.argument_slot())
            .max()
            .map_or(0, |slot| slot + 1)
    }

    /// Evaluate every node of the tree for the given input values.
    ///
    /// Children are evaluated before their parents and each node's value is recorded. On
    /// failure, nodes evaluated before the failing one keep their new values.
    #[instrument(level = "debug", skip_all, fields(nodes = self.len(), args = args.len()))]
    pub fn evaluate(&mut self, args: &[V]) -> Result<()>
    where
        V: Clone,
    {
        self.check_arguments(args)?;
        let mut values = FnvHashMap::default();
        let result = self.root.fold(|node, inputs| {
            let value = node.primitive.evaluate(&inputs, args)?;
            trace!(node = %node.id, name = node.name(), "evaluated");
            values.insert(node.id, value.clone());
            Ok(value)
        });

        // Record whatever was evaluated, even if a later node failed.
        let mut stack = vec![&mut self.root];
        while let Some(node) = stack.pop() {
            if let Some(value) = values.remove(&node.id) {
                node.value = Some(value);
            }
            stack.extend(node.children.iter_mut());
        }
        result.map(|_| ())
    }

    /// Evaluate the tree for the given inputs without recording any node values.
    pub fn call(&self, args: &[V]) -> Result<V>
    where
        V: Clone,
    {
        self.check_arguments(args)?;
        self.root.call(args)
    }

    fn check_arguments(&self, args: &[V]) -> Result<()> {
        let required = self.required_arguments();
        if args.len() < required {
            return Err(Error::Argument { required, provided: args.len() });
        }
        Ok(())
    }
}

impl<V> PartialEq for Tree<V> {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl<V> fmt::Display for Tree<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}

impl<'a, V> Iterator for Nodes<'a, V> {
    type Item = &'a Node<V>;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Functions for generating random token streams from a primitive set.
pub mod gen {
    use rand::seq::SliceRandom;
    use rand::Rng;

    use super::Arity;
    use crate::error::{Error, Result};
    use crate::gp::pset::PrimitiveSet;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    enum Method {
        Full,
        Grow,
    }

    /// Generate an expression using either `full` or `grow` at random, with a depth chosen
    /// uniformly from `min_depth..=max_depth`.
    pub fn half_and_half<'a, R, V>(
        rng: &mut R,
        pset: &'a PrimitiveSet<V>,
        min_depth: u32,
        max_depth: u32,
    ) -> Result<Vec<&'a str>>
    where
        R: Rng,
    {
        if min_depth > max_depth {
            return Err(Error::generation(format!(
                "min depth {} exceeds max depth {}",
                min_depth, max_depth
            )));
        }
        let depth = rng.gen_range(min_depth..=max_depth);
        match rng.gen_range(0..2) {
            0 => full(rng, pset, depth),
            _ => grow(rng, pset, depth),
        }
    }

    /// Generate an expression using the "full" approach.
    ///
    /// All branches will end with terminals at the given `depth`, while all other nodes will
    /// be functions.
    pub fn full<'a, R, V>(rng: &mut R, pset: &'a PrimitiveSet<V>, depth: u32) -> Result<Vec<&'a str>>
    where
        R: Rng,
    {
        generate(rng, pset, depth, Method::Full)
    }

    /// Generate an expression using the "grow" approach.
    ///
    /// The root is always a function (when depth allows), after which each node is randomly
    /// chosen to be a function or terminal, becoming likelier to be a terminal the closer it
    /// is to the given `depth`.
    pub fn grow<'a, R, V>(rng: &mut R, pset: &'a PrimitiveSet<V>, depth: u32) -> Result<Vec<&'a str>>
    where
        R: Rng,
    {
        generate(rng, pset, depth, Method::Grow)
    }

    fn generate<'a, R, V>(
        rng: &mut R,
        pset: &'a PrimitiveSet<V>,
        depth: u32,
        method: Method,
    ) -> Result<Vec<&'a str>>
    where
        R: Rng,
    {
        if depth == 0 {
            return Err(Error::generation("depth must be at least 1"));
        }
        if pset.terminals().is_empty() {
            return Err(Error::generation(format!(
                "primitive set `{}` has no terminals",
                pset.name()
            )));
        }

        // The level of each node yet to be generated. Siblings share a level, so the order
        // in which they are popped doesn't matter.
        let mut levels = vec![0];
        let mut tokens = vec![];
        while let Some(level) = levels.pop() {
            let terminal = level + 1 >= depth
                || pset.functions().is_empty()
                || match method {
                    Method::Full => false,
                    Method::Grow => level > 0 && rng.gen_range(0..depth - level) == 0,
                };
            let set = if terminal { pset.terminals() } else { pset.functions() };
            let primitive = match set.choose(rng) {
                Some(p) => p,
                None => return Err(Error::generation("no primitive to choose from")),
            };
            levels.extend((0..primitive.arity()).map(|_| level + 1));
            tokens.push(primitive.name());
        }
        Ok(tokens)
    }
}
