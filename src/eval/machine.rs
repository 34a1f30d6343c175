// Copyright 2021 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The control-stack-environment machine.
//!
//! The machine holds two stacks. The control stack holds cells still to be
//! executed, and is popped from the tail; the value stack holds operands and
//! results. Applying a closure opens a scope: a marker carrying the new
//! environment's ordinal is pushed onto both stacks, and when the control
//! marker is reached the scope's single result is lifted over the value
//! marker and the environment is dropped.

use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use crate::eval::control::Binder;
use crate::eval::control::Cell;
use crate::eval::control::ControlTable;
use crate::eval::env::Env;
use crate::eval::error::EvalError;
use crate::eval::value::Builtin;
use crate::eval::value::Closure;
use crate::eval::value::Type;
use crate::eval::value::Value;
use crate::eval::DivisionPolicy;

/// An entry on the control stack.
#[derive(Copy, Clone, Debug)]
enum Control<'t> {
  Cell(&'t Cell),
  /// An application not taken from any structure; unrolling a fixed-point
  /// closure pushes two of these.
  Apply,
  /// The end of the scope with the given ordinal.
  Exit(usize),
}

/// An entry on the value stack.
#[derive(Clone, Debug)]
enum Entry<'t> {
  Value(Value<'t>),
  /// The start of the scope with the given ordinal.
  Scope(usize),
}

/// A `Machine` runs the control structures of one program, writing `Print`
/// output to `out`.
pub struct Machine<'t, W> {
  table: &'t ControlTable,
  division: DivisionPolicy,
  out: W,

  control: Vec<Control<'t>>,
  stack: Vec<Entry<'t>>,
  envs: Vec<Env<'t>>,
  next_env: usize,
}

impl<'t, W: io::Write> Machine<'t, W> {
  /// Creates a new `Machine` for `table`.
  pub fn new(table: &'t ControlTable, division: DivisionPolicy, out: W) -> Self {
    Machine {
      table,
      division,
      out,
      control: Vec::new(),
      stack: Vec::new(),
      envs: Vec::new(),
      next_env: 1,
    }
  }

  /// Runs the program to completion, returning the value of its top-level
  /// expression.
  #[tracing::instrument(skip_all, fields(structures = self.table.len()))]
  pub fn run(mut self) -> Result<Value<'t>, EvalError> {
    let root = Env::root();
    self.stack.push(Entry::Scope(root.id()));
    self.control.push(Control::Exit(root.id()));
    self.envs.push(root);
    self.load(0)?;

    let mut steps = 0usize;
    while let Some(next) = self.control.pop() {
      steps += 1;
      self.step(next)?;
    }
    tracing::debug!(steps, scopes = self.next_env, "machine halted");

    match (self.stack.pop(), self.stack.is_empty()) {
      (Some(Entry::Value(v)), true) => Ok(v),
      (top, _) => bug!(
        "machine halted with {} entries on the stack (top: {:?})",
        self.stack.len() + top.is_some() as usize,
        top
      ),
    }
  }

  /// Pushes the cells of structure `index` onto the control stack.
  fn load(&mut self, index: usize) -> Result<(), EvalError> {
    match self.table.get(index) {
      Some(cells) => {
        self.control.extend(cells.iter().map(Control::Cell));
        Ok(())
      }
      None => bug!("no control structure with index {}", index),
    }
  }

  fn env(&self) -> Result<&Env<'t>, EvalError> {
    match self.envs.last() {
      Some(env) => Ok(env),
      None => bug!("environment stack is empty"),
    }
  }

  fn push(&mut self, value: Value<'t>) {
    self.stack.push(Entry::Value(value));
  }

  fn pop(&mut self, rule: &'static str) -> Result<Value<'t>, EvalError> {
    match self.stack.pop() {
      Some(Entry::Value(v)) => Ok(v),
      Some(Entry::Scope(id)) => {
        bug!("`{}` found the marker of scope {} instead of a value", rule, id)
      }
      None => Err(EvalError::Underflow(rule)),
    }
  }

  /// Pops a cell that an earlier cell of the same structure left on the
  /// control stack.
  fn pop_cell(&mut self, rule: &'static str) -> Result<&'t Cell, EvalError> {
    match self.control.pop() {
      Some(Control::Cell(cell)) => Ok(cell),
      Some(other) => bug!("`{}` found {:?} instead of a cell", rule, other),
      None => Err(EvalError::Underflow(rule)),
    }
  }

  fn step(&mut self, next: Control<'t>) -> Result<(), EvalError> {
    let cell = match next {
      Control::Exit(id) => return self.exit_scope(id),
      Control::Apply => {
        let rator = self.pop("gamma")?;
        return self.apply(rator);
      }
      Control::Cell(cell) => cell,
    };
    tracing::trace!(%cell, stack = self.stack.len(), "step");

    match cell {
      Cell::Name(name) => {
        let value = self.lookup(name)?;
        self.push(value)
      }
      Cell::Int(n) => self.push(Value::Int(*n)),
      Cell::Str(s) => self.push(Value::Str(Rc::clone(s))),
      Cell::Bool(b) => self.push(Value::Bool(*b)),
      Cell::Nil => self.push(Value::nil()),
      Cell::Dummy => self.push(Value::Dummy),
      Cell::YStar => self.push(Value::YStar),

      Cell::Lambda => {
        let binder = match self.pop_cell("lambda")? {
          Cell::Binder(binder) => binder,
          other => bug!("lambda expected a binder, found `{}`", other),
        };
        let body = match self.pop_cell("lambda")? {
          Cell::Delta(body) => *body,
          other => bug!("lambda expected a delta, found `{}`", other),
        };
        let env = self.env()?.clone();
        self.push(Value::Closure(Closure { body, binder, env }))
      }

      Cell::Gamma => {
        let rator = self.pop("gamma")?;
        self.apply(rator)?
      }

      Cell::Beta => {
        let cond = match self.pop("beta")? {
          Value::Bool(b) => b,
          v => error!(Type, "condition must be a truthvalue, got {}", v.ty()),
        };
        let otherwise = self.pop_cell("beta")?;
        let then = self.pop_cell("beta")?;
        match (cond, then, otherwise) {
          (true, Cell::Delta(k), Cell::Delta(_))
          | (false, Cell::Delta(_), Cell::Delta(k)) => self.load(*k)?,
          _ => bug!("beta expected two deltas, found `{}` `{}`", then, otherwise),
        }
      }

      Cell::Tau => {
        let order = match self.pop_cell("tau")? {
          Cell::Count(n) => *n,
          other => bug!("tau expected a count, found `{}`", other),
        };
        let mut items = Vec::with_capacity(order);
        for _ in 0..order {
          items.push(self.pop("tau")?);
        }
        self.push(Value::tuple(items))
      }

      Cell::Aug => {
        let tuple = self.pop("aug")?;
        let item = self.pop("aug")?;
        let value = aug(tuple, item)?;
        self.push(value)
      }

      Cell::BinOp(op) => {
        let lhs = self.pop(op.name())?;
        let rhs = self.pop(op.name())?;
        let value = op.apply(lhs, rhs, self.division)?;
        self.push(value)
      }
      Cell::UnOp(op) => {
        let arg = self.pop(op.name())?;
        let value = op.apply(arg)?;
        self.push(value)
      }

      Cell::Delta(_) | Cell::Binder(_) | Cell::Count(_) => {
        bug!("`{}` executed outside of the cell that owns it", cell)
      }
    }
    Ok(())
  }

  /// Resolves `name` against the environment chain, then the built-ins.
  fn lookup(&self, name: &str) -> Result<Value<'t>, EvalError> {
    if let Some(value) = self.env()?.lookup(name) {
      return Ok(value);
    }
    match Builtin::from_name(name) {
      Some(builtin) => Ok(Value::Builtin(builtin)),
      None => Err(EvalError::Unbound(name.to_string())),
    }
  }

  /// Applies `rator` to the value beneath it.
  fn apply(&mut self, rator: Value<'t>) -> Result<(), EvalError> {
    match rator {
      Value::Closure(closure) => {
        let rand = self.pop("gamma")?;
        self.enter(closure, rand)?;
      }

      Value::Tuple(items) => {
        let index = match self.pop("gamma")? {
          Value::Int(n) => n,
          v => error!(Type, "tuples are indexed by integers, not {}", v.ty()),
        };
        let item = match index.checked_sub(1).map(usize::try_from) {
          Some(Ok(i)) => items.get(i),
          _ => None,
        };
        match item {
          Some(item) => self.push(item.clone()),
          None => {
            return Err(EvalError::Index {
              index,
              order: items.len(),
            })
          }
        }
      }

      Value::YStar => match self.pop("Y*")? {
        Value::Closure(closure) => self.push(Value::Eta(closure)),
        v => error!(Type, "Y* expects a lambda closure, got {}", v.ty()),
      },

      Value::Eta(closure) => {
        self.push(Value::Eta(closure.clone()));
        self.push(Value::Closure(closure));
        self.control.push(Control::Apply);
        self.control.push(Control::Apply);
      }

      Value::Builtin(builtin) => {
        let arg = self.pop(builtin.name())?;
        let value = self.builtin(builtin, arg)?;
        self.push(value);
      }

      Value::PartialConc(lhs) => match self.pop("Conc")? {
        Value::Str(rhs) => {
          let mut buf = String::with_capacity(lhs.len() + rhs.len());
          buf.push_str(&lhs);
          buf.push_str(&rhs);
          self.push(Value::Str(buf.into()))
        }
        v => error!(Type, "Conc expects two strings, got string and {}", v.ty()),
      },

      v => error!(Type, "cannot apply a value of type {}", v.ty()),
    }
    Ok(())
  }

  /// Opens a new scope for an application of `closure` to `rand`.
  fn enter(
    &mut self,
    closure: Closure<'t>,
    rand: Value<'t>,
  ) -> Result<(), EvalError> {
    let mut bindings = HashMap::new();
    match closure.binder {
      Binder::Name(name) => {
        bindings.insert(name.as_str(), rand);
      }
      Binder::Tuple(names) => match rand {
        Value::Tuple(items) if items.len() == names.len() => {
          for (name, item) in names.iter().zip(items.iter()) {
            bindings.insert(name.as_str(), item.clone());
          }
        }
        Value::Tuple(items) => {
          return Err(EvalError::Arity {
            expected: names.len(),
            found: items.len(),
          })
        }
        v => error!(Type, "cannot bind `{}` to {}", closure.binder, v.ty()),
      },
      Binder::Empty => {}
    }

    let id = self.next_env;
    self.next_env += 1;
    let env = closure.env.extend(id, bindings);
    tracing::trace!(env = id, parent = closure.env.id(), "enter scope");

    self.stack.push(Entry::Scope(id));
    self.control.push(Control::Exit(id));
    self.envs.push(env);
    self.load(closure.body)
  }

  fn exit_scope(&mut self, id: usize) -> Result<(), EvalError> {
    let result = self.pop("scope exit")?;
    match self.stack.pop() {
      Some(Entry::Scope(marker)) if marker == id => {}
      other => bug!("scope {} closed over {:?}", id, other),
    }
    match self.envs.pop() {
      Some(env) if env.id() == id => {}
      other => bug!("scope {} closed, but the current scope is {:?}", id, other),
    }
    self.push(result);
    Ok(())
  }

  fn builtin(
    &mut self,
    builtin: Builtin,
    arg: Value<'t>,
  ) -> Result<Value<'t>, EvalError> {
    let value = match (builtin, arg) {
      (Builtin::Print, v) => {
        write!(self.out, "{}", v)?;
        Value::Dummy
      }
      (Builtin::Isinteger, v) => Value::Bool(matches!(v, Value::Int(_))),
      (Builtin::Istruthvalue, v) => Value::Bool(matches!(v, Value::Bool(_))),
      (Builtin::Isstring, v) => Value::Bool(matches!(v, Value::Str(_))),
      (Builtin::Istuple, v) => Value::Bool(matches!(v, Value::Tuple(_))),
      (Builtin::Isdummy, v) => Value::Bool(matches!(v, Value::Dummy)),
      (Builtin::Isfunction, v) => Value::Bool(v.ty() == Type::Function),

      (Builtin::Stem, Value::Str(s)) => match s.chars().next() {
        Some(c) => Value::Str(c.to_string().into()),
        None => error!(Type, "Stem of the empty string"),
      },
      (Builtin::Stern, Value::Str(s)) => match s.chars().next() {
        Some(c) => Value::Str(s[c.len_utf8()..].into()),
        None => error!(Type, "Stern of the empty string"),
      },
      (Builtin::Conc, Value::Str(s)) => Value::PartialConc(s),
      (Builtin::Order, Value::Tuple(items)) => Value::Int(items.len() as i64),
      (Builtin::Null, Value::Tuple(items)) => Value::Bool(items.is_empty()),
      (Builtin::ItoS, Value::Int(n)) => Value::Str(n.to_string().into()),

      (builtin, v) => error!(
        Type,
        "{} cannot be applied to {}",
        builtin.name(),
        v.ty()
      ),
    };
    Ok(value)
  }
}

/// Implements `aug`: appends `item` to `tuple`, or concatenates the two when
/// `item` is itself a tuple.
fn aug<'t>(tuple: Value<'t>, item: Value<'t>) -> Result<Value<'t>, EvalError> {
  let items = match tuple {
    Value::Tuple(items) => items,
    v => error!(Type, "aug expects a tuple on the left, got {}", v.ty()),
  };
  let mut items = Rc::try_unwrap(items)
    .unwrap_or_else(|rc| (*rc).clone())
    .into_vec();
  match item {
    Value::Tuple(tail) => items.extend(tail.iter().cloned()),
    v => items.push(v),
  }
  Ok(Value::tuple(items))
}

#[cfg(test)]
mod tests {
  use super::*;

  use pretty_assertions::assert_eq;

  use crate::eval::standardize::standardize;
  use crate::eval::standardize::DEFAULT_MAX_PASSES;
  use crate::syn;

  fn run_with(src: &str, division: DivisionPolicy) -> Result<String, String> {
    let mut tree = match syn::parse(src) {
      Ok(tree) => tree,
      Err(e) => panic!("failed to parse {:?}: {}", src, e),
    };
    standardize(&mut tree, DEFAULT_MAX_PASSES);
    let table = ControlTable::build(&tree).map_err(|e| e.to_string())?;
    let mut out = Vec::new();
    let value = Machine::new(&table, division, &mut out)
      .run()
      .map_err(|e| e.to_string())?;
    let printed = String::from_utf8_lossy(&out).into_owned();
    match value {
      Value::Dummy => Ok(printed),
      v => Ok(format!("{}={}", printed, v)),
    }
  }

  fn run(src: &str) -> Result<String, String> {
    run_with(src, DivisionPolicy::Strict)
  }

  #[test]
  fn prints_seven() {
    assert_eq!(run("let x = 3 in Print(x + 4)"), Ok("7".to_string()));
  }

  #[test]
  fn final_value_is_returned() {
    assert_eq!(run("1 + 2"), Ok("=3".to_string()));
  }

  #[test]
  fn recursion_through_the_fixed_point() {
    let src = "
      let rec fact n = n eq 0 -> 1 | n * fact (n - 1)
      in Print (fact 5)
    ";
    assert_eq!(run(src), Ok("120".to_string()));
  }

  #[test]
  fn tuple_indexing_is_one_based() {
    assert_eq!(run("Print ((10, 20, 30) 2)"), Ok("20".to_string()));
    assert_eq!(
      run("(10, 20) 3"),
      Err("tuple index 3 out of range for a tuple of order 2".to_string())
    );
    assert!(run("(10, 20) 0").is_err());
  }

  #[test]
  fn tuple_binders_bind_by_position() {
    assert_eq!(
      run("let f (a, b) = a - b in Print (f (10, 3))"),
      Ok("7".to_string())
    );
    assert_eq!(
      run("let f (a, b) = a in f (1, 2, 3)"),
      Err("cannot bind 2 names to a tuple of order 3".to_string())
    );
  }

  #[test]
  fn simultaneous_definitions() {
    assert_eq!(
      run("let a = 1 and b = 2 in Print (a + b)"),
      Ok("3".to_string())
    );
  }

  #[test]
  fn closures_capture_their_environment() {
    let src = "let add x y = x + y in let inc = add 1 in Print (inc 41)";
    assert_eq!(run(src), Ok("42".to_string()));
  }

  #[test]
  fn string_builtins() {
    assert_eq!(run("Print (Stem 'abc')"), Ok("a".to_string()));
    assert_eq!(run("Print (Stern 'abc')"), Ok("bc".to_string()));
    assert_eq!(run("Print (Conc 'ab' 'cd')"), Ok("abcd".to_string()));
    assert_eq!(run("Print (ItoS 42)"), Ok("42".to_string()));
  }

  #[test]
  fn aug_and_order() {
    assert_eq!(
      run("Print (Order (nil aug 1 aug 2 aug 3))"),
      Ok("3".to_string())
    );
    assert_eq!(run("Print (Order nil)"), Ok("0".to_string()));
    assert_eq!(
      run("Print ((1, 2) aug (3, 4))"),
      Ok("(1, 2, 3, 4)".to_string())
    );
    assert_eq!(
      run("Print (Null nil, Null (nil aug 1))"),
      Ok("(true, false)".to_string())
    );
  }

  #[test]
  fn conditionals() {
    let src = "Print (3 gr 2 -> 'yes' | 'no', 1 > 2 -> 'yes' | 'no')";
    assert_eq!(run(src), Ok("(yes, no)".to_string()));
  }

  #[test]
  fn printing_closures() {
    assert_eq!(
      run("Print (fn x. x)"),
      Ok("[lambda closure: x: 1]".to_string())
    );
  }

  #[test]
  fn printing_a_closure_does_not_stop_the_program() {
    assert_eq!(
      run("(Print (fn x. x), Print 1)"),
      Ok("1[lambda closure: x: 1]=(dummy, dummy)".to_string())
    );
  }

  #[test]
  fn deeply_nested_values() {
    let src = "
      let rec build n = n eq 0 -> nil | (n, build (n - 1))
      in Print (Istuple (build 100000), build 3)
    ";
    assert_eq!(run(src), Ok("(true, 3, 2, 1)".to_string()));

    let src = "
      let rec wrap n f = n eq 0 -> f | wrap (n - 1) (fn x. f x + 1)
      in Print ((wrap 100000 (fn x. x)) 0)
    ";
    assert_eq!(run(src), Ok("100000".to_string()));
  }

  #[test]
  fn builtins_can_be_shadowed() {
    assert_eq!(
      run("let Order x = 99 in Print (Order nil)"),
      Ok("99".to_string())
    );
  }

  #[test]
  fn runtime_errors() {
    assert_eq!(run("Print y"), Err("unbound identifier `y`".to_string()));
    assert_eq!(
      run("1 + 'a'"),
      Err("type error: cannot apply `+` to integer and string".to_string())
    );
    assert_eq!(run("1 / 0"), Err("division by zero".to_string()));
    assert_eq!(
      run_with("Print (1 / 0)", DivisionPolicy::Lenient),
      Ok("0".to_string())
    );
    assert!(run("1 -> 2 | 3").is_err());
    assert!(run("3 4").is_err());
  }

  #[test]
  fn deep_recursion_does_not_use_the_native_stack() {
    let src = "
      let rec sum n = n eq 0 -> 0 | n + sum (n - 1)
      in Print (sum 10000)
    ";
    assert_eq!(run(src), Ok("50005000".to_string()));
  }
}
