//! Primitive sets: the named functions and terminals an expression may be built from.

use fnv::FnvHashMap;
use std::fmt;
use std::sync::Arc;

use super::expr::{Arity, Evaluate};
use crate::error::{Error, Result};

/// The callable behind a function primitive.
///
/// Receives the values of the node's children in order.
pub type Callable<V> = Arc<dyn Fn(&[V]) -> anyhow::Result<V> + Send + Sync>;

/// What a primitive does when evaluated.
pub enum Kind<V> {
    /// Applied to the values of `arity` children.
    Function { arity: usize, callable: Callable<V> },
    /// A terminal with a fixed value.
    Constant(V),
    /// A terminal standing in for the input value at the given slot.
    Argument(usize),
}

/// A named operation or terminal symbol with a fixed arity.
///
/// Primitives are owned by their `PrimitiveSet` and shared with every tree node that refers
/// to them.
pub struct Primitive<V> {
    name: String,
    kind: Kind<V>,
}

/// The collection of primitives that token streams are resolved against.
pub struct PrimitiveSet<V> {
    name: String,
    primitives: FnvHashMap<String, Arc<Primitive<V>>>,
    // Kept separately, in registration order, for expression generation.
    functions: Vec<Arc<Primitive<V>>>,
    terminals: Vec<Arc<Primitive<V>>>,
    arguments: usize,
}

impl<V> Primitive<V> {
    pub fn function<F>(name: impl Into<String>, arity: usize, f: F) -> Self
    where
        F: Fn(&[V]) -> anyhow::Result<V> + Send + Sync + 'static,
    {
        let kind = Kind::Function { arity, callable: Arc::new(f) };
        Primitive { name: name.into(), kind }
    }

    pub fn constant(name: impl Into<String>, value: V) -> Self {
        Primitive { name: name.into(), kind: Kind::Constant(value) }
    }

    pub fn argument(name: impl Into<String>, slot: usize) -> Self {
        Primitive { name: name.into(), kind: Kind::Argument(slot) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &Kind<V> {
        &self.kind
    }

    /// The input slot this primitive reads, if it is an argument terminal.
    pub fn argument_slot(&self) -> Option<usize> {
        match self.kind {
            Kind::Argument(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn is_argument(&self) -> bool {
        self.argument_slot().is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.arity() == 0
    }

    fn renamed(&self, name: String) -> Self
    where
        V: Clone,
    {
        let kind = match self.kind {
            Kind::Function { arity, ref callable } => Kind::Function { arity, callable: callable.clone() },
            Kind::Constant(ref v) => Kind::Constant(v.clone()),
            Kind::Argument(slot) => Kind::Argument(slot),
        };
        Primitive { name, kind }
    }
}

impl<V> Arity for Primitive<V> {
    fn arity(&self) -> usize {
        match self.kind {
            Kind::Function { arity, .. } => arity,
            Kind::Constant(_) | Kind::Argument(_) => 0,
        }
    }
}

impl<V: Clone> Evaluate<[V]> for Primitive<V> {
    type Value = V;

    fn evaluate(&self, inputs: &[V], args: &[V]) -> Result<V> {
        match self.kind {
            Kind::Function { ref callable, .. } => (**callable)(inputs).map_err(|source| Error::Primitive {
                name: self.name.clone(),
                source,
            }),
            Kind::Constant(ref v) => Ok(v.clone()),
            Kind::Argument(slot) => args.get(slot).cloned().ok_or(Error::Argument {
                required: slot + 1,
                provided: args.len(),
            }),
        }
    }
}

impl<V> fmt::Debug for Primitive<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            Kind::Function { .. } => "Function".to_string(),
            Kind::Constant(_) => "Constant".to_string(),
            Kind::Argument(slot) => format!("Argument({})", slot),
        };
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .field("arity", &self.arity())
            .field("kind", &kind)
            .finish()
    }
}

impl<V> PrimitiveSet<V> {
    /// An empty primitive set.
    pub fn new(name: impl Into<String>) -> Self {
        PrimitiveSet {
            name: name.into(),
            primitives: FnvHashMap::default(),
            functions: Vec::new(),
            terminals: Vec::new(),
            arguments: 0,
        }
    }

    /// A primitive set with `count` arguments named `ARG0`, `ARG1`, ...
    pub fn with_arguments(name: impl Into<String>, count: usize) -> Self {
        let mut pset = Self::new(name);
        for slot in 0..count {
            let arg = Arc::new(Primitive::argument(format!("ARG{}", slot), slot));
            pset.primitives.insert(arg.name.clone(), arg.clone());
            pset.terminals.push(arg);
        }
        pset.arguments = count;
        pset
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a function primitive taking `arity` children.
    pub fn add_primitive<F>(&mut self, name: impl Into<String>, arity: usize, f: F) -> Result<&mut Self>
    where
        F: Fn(&[V]) -> anyhow::Result<V> + Send + Sync + 'static,
    {
        self.insert(Primitive::function(name, arity, f))
    }

    /// Register a constant terminal.
    pub fn add_terminal(&mut self, name: impl Into<String>, value: V) -> Result<&mut Self> {
        self.insert(Primitive::constant(name, value))
    }

    /// Register an argument terminal reading the next free input slot.
    pub fn add_argument(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        let slot = self.arguments;
        self.insert(Primitive::argument(name, slot))?;
        self.arguments += 1;
        Ok(self)
    }

    /// Give an argument terminal a new name, keeping its slot.
    ///
    /// Trees already built keep referring to the primitive under its old name.
    pub fn rename_argument(&mut self, old: &str, new: impl Into<String>) -> Result<&mut Self>
    where
        V: Clone,
    {
        let new = new.into();
        if self.primitives.contains_key(&new) {
            return Err(Error::DuplicatePrimitive(new));
        }
        let prev = match self.primitives.get(old) {
            Some(p) if p.is_argument() => p.clone(),
            _ => return Err(Error::UnknownArgument(old.to_string())),
        };
        let renamed = Arc::new(prev.renamed(new.clone()));
        self.primitives.remove(old);
        self.primitives.insert(new, renamed.clone());
        for t in self.terminals.iter_mut().filter(|t| Arc::ptr_eq(t, &prev)) {
            *t = renamed.clone();
        }
        Ok(self)
    }

    /// Look up the primitive a token refers to.
    pub fn get(&self, token: &str) -> Option<&Arc<Primitive<V>>> {
        self.primitives.get(token)
    }

    /// Primitives with arity of one or more, in registration order.
    pub fn functions(&self) -> &[Arc<Primitive<V>>] {
        &self.functions
    }

    /// Primitives with arity zero, in registration order.
    pub fn terminals(&self) -> &[Arc<Primitive<V>>] {
        &self.terminals
    }

    /// The number of input values an expression over this set may read.
    pub fn argument_count(&self) -> usize {
        self.arguments
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    fn insert(&mut self, primitive: Primitive<V>) -> Result<&mut Self> {
        if self.primitives.contains_key(&primitive.name) {
            return Err(Error::DuplicatePrimitive(primitive.name));
        }
        let primitive = Arc::new(primitive);
        self.primitives.insert(primitive.name.clone(), primitive.clone());
        if primitive.is_terminal() {
            self.terminals.push(primitive);
        } else {
            self.functions.push(primitive);
        }
        Ok(self)
    }
}

impl<V> fmt::Debug for PrimitiveSet<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrimitiveSet")
            .field("name", &self.name)
            .field("functions", &self.functions)
            .field("terminals", &self.terminals)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pset() -> PrimitiveSet<i64> {
        let mut pset = PrimitiveSet::with_arguments("MAIN", 1);
        pset.add_primitive("add", 2, |xs: &[i64]| Ok(xs[0] + xs[1]))
            .unwrap()
            .add_primitive("neg", 1, |xs: &[i64]| Ok(-xs[0]))
            .unwrap()
            .add_terminal("3", 3)
            .unwrap();
        pset
    }

    #[test]
    fn functions_and_terminals_are_split_by_arity() {
        let pset = pset();
        let functions: Vec<_> = pset.functions().iter().map(|p| p.name()).collect();
        let terminals: Vec<_> = pset.terminals().iter().map(|p| p.name()).collect();
        assert_eq!(functions, ["add", "neg"]);
        assert_eq!(terminals, ["ARG0", "3"]);
        assert_eq!(pset.argument_count(), 1);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut pset = pset();
        let err = pset.add_terminal("add", 1).unwrap_err();
        assert!(matches!(err, Error::DuplicatePrimitive(ref n) if n == "add"));
    }

    #[test]
    fn renamed_arguments_keep_their_slot() {
        let mut pset = pset();
        pset.rename_argument("ARG0", "x").unwrap();
        assert!(pset.get("ARG0").is_none());
        let x = pset.get("x").unwrap();
        assert_eq!(x.argument_slot(), Some(0));
        assert_eq!(pset.terminals()[0].name(), "x");
    }

    #[test]
    fn renaming_a_constant_is_an_error() {
        let mut pset = pset();
        assert!(matches!(pset.rename_argument("3", "three"), Err(Error::UnknownArgument(_))));
    }

    #[test]
    fn evaluating_primitives() {
        let pset = pset();
        let add = pset.get("add").unwrap();
        assert_eq!(add.evaluate(&[2, 5], &[]).unwrap(), 7);
        let x = pset.get("ARG0").unwrap();
        assert_eq!(x.evaluate(&[], &[9]).unwrap(), 9);
        assert!(matches!(
            x.evaluate(&[], &[]),
            Err(Error::Argument { required: 1, provided: 0 })
        ));
    }
}
