//! Demonstrates drawing the best of a batch of random expressions approximating
//! `sin(x^2) - x`.
//!
//! 1. What is the "Terminal Set"?
//!
//! - The input `x`.
//! - The constants -1, 0 and 1.
//!
//! 2. What is the "Function Set"?
//!
//! - `add` `sub` `mul` `div` (protected, returning 1 on division by zero)
//! - `neg` `cos` `sin`
//!
//! 3. What is the "Fitness Measure"?
//!
//! - The mean squared error over 20 points in -1..1.
//!
//! The winning expression is drawn for `x = 7` to the path given as the first argument, or
//! `symbolic_regression.dot` by default.

use gptree::{gen, Drawer, PrimitiveSet, Tree};
use rand::rngs::StdRng;
use rand::SeedableRng;

// Constants.

const SEED: u64 = 318;
const INDIVIDUALS: usize = 300;
const MIN_DEPTH: u32 = 1;
const MAX_DEPTH: u32 = 4;
const INPUT: f64 = 7.0;

fn pset() -> gptree::Result<PrimitiveSet<f64>> {
    let mut pset = PrimitiveSet::with_arguments("MAIN", 1);
    pset.add_primitive("add", 2, |xs: &[f64]| Ok(xs[0] + xs[1]))?
        .add_primitive("sub", 2, |xs: &[f64]| Ok(xs[0] - xs[1]))?
        .add_primitive("mul", 2, |xs: &[f64]| Ok(xs[0] * xs[1]))?
        .add_primitive("div", 2, |xs: &[f64]| Ok(if xs[1] == 0.0 { 1.0 } else { xs[0] / xs[1] }))?
        .add_primitive("neg", 1, |xs: &[f64]| Ok(-xs[0]))?
        .add_primitive("cos", 1, |xs: &[f64]| Ok(xs[0].cos()))?
        .add_primitive("sin", 1, |xs: &[f64]| Ok(xs[0].sin()))?
        .add_terminal("-1", -1.0)?
        .add_terminal("0", 0.0)?
        .add_terminal("1", 1.0)?
        .rename_argument("ARG0", "x")?;
    Ok(pset)
}

fn mean_squared_error(tree: &Tree<f64>, points: &[f64]) -> gptree::Result<f64> {
    let mut sum = 0.0;
    for &x in points {
        let err = tree.call(&[x])? - ((x * x).sin() - x);
        sum += err * err;
    }
    Ok(sum / points.len() as f64)
}

fn main() -> gptree::Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "symbolic_regression.dot".to_string());
    let pset = pset()?;
    let points: Vec<f64> = (-10..10).map(|i| i as f64 / 10.0).collect();
    let mut rng = StdRng::seed_from_u64(SEED);

    let mut best: Option<(Tree<f64>, f64)> = None;
    for _ in 0..INDIVIDUALS {
        let tokens = gen::half_and_half(&mut rng, &pset, MIN_DEPTH, MAX_DEPTH)?;
        let tree = Tree::of(tokens, &pset)?;
        let fitness = mean_squared_error(&tree, &points)?;
        if fitness.is_finite() && best.as_ref().map_or(true, |&(_, f)| fitness < f) {
            best = Some((tree, fitness));
        }
    }

    if let Some((mut tree, fitness)) = best {
        println!("best: {} (mse {:.4})", tree, fitness);
        Drawer::new().save_graph(&path, &mut tree, &[INPUT])?;
        println!("saved to {}", path);
    }
    Ok(())
}
