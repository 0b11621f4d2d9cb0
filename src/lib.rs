//! Rebuild genetic programming expressions as trees and draw them for concrete inputs.
//!
//! 1. Describe the primitives an expression may use with a `PrimitiveSet`.
//! 2. Rebuild the expression's prefix-ordered token stream into a `Tree` with `Tree::of`.
//! 3. Draw the tree for some inputs with a `Drawer`. The value produced at every node is
//!    drawn beside it, as text or, for 2-D values, as an image.
//!
//! ```no_run
//! use gptree::{Drawer, PrimitiveSet, Tree};
//!
//! # fn main() -> gptree::Result<()> {
//! let mut pset = PrimitiveSet::new("MAIN");
//! pset.add_primitive("add", 2, |xs: &[i64]| Ok(xs[0] + xs[1]))?
//!     .add_argument("x")?
//!     .add_terminal("3", 3)?;
//!
//! let mut tree = Tree::of(["add", "x", "3"], &pset)?;
//! Drawer::new().save_graph("tree.png", &mut tree, &[7])?;
//! # Ok(())
//! # }
//! ```

pub mod draw;
pub mod error;
pub mod gp;

pub use draw::{draw_image, draw_nothing, draw_text, Canvas, DrawOptions, Drawer, GraphCanvas, RuleSet};
pub use error::{Error, Result, StructureError};
pub use gp::expr::{gen, Arity, Node, NodeId, Tree};
pub use gp::pset::{Kind, Primitive, PrimitiveSet};
pub use gp::value::{save_image, Grayscale, Matrix, Value, Visual};
