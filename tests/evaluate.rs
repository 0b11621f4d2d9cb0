mod common;

use gptree::{Error, NodeId, Tree, Value};

use common::{arithmetic, gradient, imaging};

fn values(tree: &Tree<i64>) -> Vec<Option<i64>> {
    tree.nodes().map(|n| n.value().copied()).collect()
}

#[test]
fn add_x_3_evaluates_to_10() {
    let mut tree = Tree::of(["add", "x", "3"], &arithmetic()).unwrap();
    tree.evaluate(&[7]).unwrap();
    assert_eq!(tree.root().value(), Some(&10));
    assert_eq!(values(&tree), [Some(10), Some(7), Some(3)]);
}

#[test]
fn every_node_receives_its_own_value() {
    let mut tree = Tree::parse("sub(mul(x, y), neg(if_pos(x, 3, 1)))", &arithmetic()).unwrap();
    tree.evaluate(&[-2, 5]).unwrap();
    // sub(-10, neg(1)) = -9
    assert_eq!(
        values(&tree),
        [Some(-9), Some(-10), Some(-2), Some(5), Some(-1), Some(1), Some(-2), Some(3), Some(1)]
    );
}

#[test]
fn repeated_evaluation_is_deterministic_and_overwrites_values() {
    let mut tree = Tree::parse("add(mul(x, x), y)", &arithmetic()).unwrap();
    tree.evaluate(&[3, 1]).unwrap();
    let first = values(&tree);
    tree.evaluate(&[3, 1]).unwrap();
    assert_eq!(values(&tree), first);

    tree.evaluate(&[2, 0]).unwrap();
    assert_eq!(tree.root().value(), Some(&4));
    assert_eq!(tree.call(&[3, 1]).unwrap(), 10);
    assert_eq!(tree.root().value(), Some(&4));
}

#[test]
fn missing_inputs_are_an_argument_error() {
    let mut tree = Tree::of(["add", "x", "y"], &arithmetic()).unwrap();
    let err = tree.evaluate(&[1]).unwrap_err();
    assert!(matches!(err, Error::Argument { required: 2, provided: 1 }));
    assert!(tree.nodes().all(|n| n.value().is_none()));
}

#[test]
fn extra_inputs_are_ignored() {
    let mut tree = Tree::of(["neg", "x"], &arithmetic()).unwrap();
    tree.evaluate(&[4, 100, 1000]).unwrap();
    assert_eq!(tree.root().value(), Some(&-4));
}

#[test]
fn constant_trees_need_no_inputs() {
    let mut tree = Tree::of(["mul", "3", "3"], &arithmetic()).unwrap();
    tree.evaluate(&[]).unwrap();
    assert_eq!(tree.root().value(), Some(&9));
}

#[test]
fn primitive_failures_name_the_primitive() {
    let mut tree = Tree::of(["add", "1", "div", "x", "y"], &arithmetic()).unwrap();
    let err = tree.evaluate(&[1, 0]).unwrap_err();
    match err {
        Error::Primitive { ref name, ref source } => {
            assert_eq!(name, "div");
            assert_eq!(source.to_string(), "division by zero");
        }
        ref other => panic!("expected a primitive failure, got {:?}", other),
    }
    // Children evaluated before the failure keep their values.
    let x = tree.node(NodeId(3)).unwrap();
    assert_eq!(x.value(), Some(&1));
    assert!(tree.root().value().is_none());
}

#[test]
fn images_flow_through_the_tree() {
    let mut tree = Tree::parse("mean(scale(invert(img), 2))", &imaging()).unwrap();
    let img = gradient(2, 2);
    tree.evaluate(&[img.clone()]).unwrap();

    // invert: [1, 0, -1, -2]; scale by 2: [2, 0, -2, -4]; mean: -1
    assert_eq!(tree.root().value(), Some(&Value::Float(-1.0)));
    let img_node = tree.node(NodeId(3)).unwrap();
    assert_eq!(img_node.name(), "img");
    assert_eq!(img_node.value(), Some(&img));
}

#[test]
fn type_mismatches_surface_as_primitive_errors() {
    let mut tree = Tree::parse("invert(2)", &imaging()).unwrap();
    let err = tree.evaluate(&[gradient(1, 1)]).unwrap_err();
    assert!(matches!(err, Error::Primitive { ref name, .. } if name == "invert"));
}

#[test]
fn very_deep_chains_evaluate() {
    let mut tokens = vec!["neg"; 10_000];
    tokens.push("x");
    let mut tree = Tree::of(&tokens, &arithmetic()).unwrap();

    assert_eq!(tree.call(&[1]).unwrap(), 1);
    tree.evaluate(&[1]).unwrap();
    assert_eq!(tree.root().value(), Some(&1));
    assert_eq!(tree.node(NodeId(1)).and_then(|n| n.value()), Some(&-1));
    assert!(tree.nodes().all(|n| n.value().is_some()));
}
