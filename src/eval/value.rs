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

//! RPAL runtime values. These consist of six types:
//! - `integer`, a 64-bit signed integer.
//! - `truthvalue`, a boolean.
//! - `string`, an immutable string.
//! - `tuple`, an ordered sequence of values; `nil` is the empty tuple.
//! - `function`, a closure, fixed-point closure, or built-in.
//! - `dummy`, the singleton value of `dummy` and of `Print`.

use std::fmt;
use std::mem;
use std::ops::Deref;
use std::rc::Rc;

use crate::eval::control::Binder;
use crate::eval::env::Env;

/// A `Value` is an RPAL value. The lifetime `'t` is that of the control
/// structure table the running program was built from.
#[derive(Clone, Debug)]
pub enum Value<'t> {
  Int(i64),
  Str(Rc<str>),
  Bool(bool),
  Dummy,
  Tuple(Rc<Items<'t>>),
  Closure(Closure<'t>),
  /// A closure produced by `Y*`; applying it unrolls one level of recursion.
  Eta(Closure<'t>),
  Builtin(Builtin),
  /// `Conc` applied to its first argument.
  PartialConc(Rc<str>),
  YStar,
}

impl<'t> Value<'t> {
  /// Returns the empty tuple, `nil`.
  pub fn nil() -> Self {
    Value::tuple(Vec::new())
  }

  /// Returns a tuple of `items`, in order.
  pub fn tuple(items: Vec<Value<'t>>) -> Self {
    Value::Tuple(Rc::new(Items(items)))
  }

  /// Returns the `Type` of this `Value`.
  pub fn ty(&self) -> Type {
    match self {
      Value::Int(..) => Type::Integer,
      Value::Str(..) => Type::String,
      Value::Bool(..) => Type::Truthvalue,
      Value::Dummy => Type::Dummy,
      Value::Tuple(..) => Type::Tuple,
      Value::Closure(..)
      | Value::Eta(..)
      | Value::Builtin(..)
      | Value::PartialConc(..)
      | Value::YStar => Type::Function,
    }
  }
}

impl fmt::Display for Value<'_> {
  /// Formats this value the way `Print` shows it.
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Value::Int(n) => write!(f, "{}", n),
      Value::Str(s) => write!(f, "{}", s),
      Value::Bool(b) => write!(f, "{}", b),
      Value::Dummy => write!(f, "dummy"),
      Value::Tuple(items) if items.is_empty() => write!(f, "nil"),
      Value::Tuple(items) => {
        let mut leaves = Vec::new();
        flatten(items, &mut leaves);
        write!(f, "(")?;
        for (i, leaf) in leaves.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}", leaf)?;
        }
        write!(f, ")")
      }
      Value::Closure(c) => {
        write!(f, "[lambda closure: {}: {}]", c.binder, c.body)
      }
      Value::Eta(c) => write!(f, "[eta closure: {}: {}]", c.binder, c.body),
      Value::Builtin(b) => write!(f, "{}", b.name()),
      Value::PartialConc(_) => write!(f, "Conc"),
      Value::YStar => write!(f, "Y*"),
    }
  }
}

/// Collects the non-tuple elements of a tuple, depth first.
fn flatten<'a, 't>(items: &'a [Value<'t>], out: &mut Vec<&'a Value<'t>>) {
  let mut stack = vec![items.iter()];
  while let Some(iter) = stack.last_mut() {
    match iter.next() {
      Some(Value::Tuple(inner)) => stack.push(inner.iter()),
      Some(v) => out.push(v),
      None => {
        stack.pop();
      }
    }
  }
}

/// The elements of a tuple.
///
/// Tuples may nest far deeper than the native stack allows, so dropping the
/// last reference to one releases its elements with `release` rather than
/// recursively.
#[derive(Clone, Debug, Default)]
pub struct Items<'t>(Vec<Value<'t>>);

impl<'t> Items<'t> {
  /// Takes the elements out of this tuple.
  pub fn into_vec(mut self) -> Vec<Value<'t>> {
    mem::take(&mut self.0)
  }
}

impl<'t> Deref for Items<'t> {
  type Target = [Value<'t>];
  fn deref(&self) -> &[Value<'t>] {
    &self.0
  }
}

impl Drop for Items<'_> {
  fn drop(&mut self) {
    if !self.0.is_empty() {
      release(mem::take(&mut self.0), Vec::new());
    }
  }
}

/// Drops `values` and `envs` with a worklist. Anything they hold the last
/// reference to, such as a nested tuple or a closure's environment, is taken
/// apart onto the worklist instead of being dropped in place.
pub(crate) fn release<'t>(
  mut values: Vec<Value<'t>>,
  mut envs: Vec<Env<'t>>,
) {
  loop {
    if let Some(value) = values.pop() {
      match value {
        Value::Tuple(items) => {
          if let Ok(items) = Rc::try_unwrap(items) {
            values.extend(items.into_vec());
          }
        }
        Value::Closure(c) | Value::Eta(c) => envs.push(c.env),
        _ => {}
      }
    } else if let Some(env) = envs.pop() {
      env.unlink(&mut values, &mut envs);
    } else {
      return;
    }
  }
}

/// A `Closure` is a function that has not been applied yet: the control
/// structure holding its body, the names it binds, and the environment it was
/// created in.
#[derive(Clone, Debug)]
pub struct Closure<'t> {
  pub body: usize,
  pub binder: &'t Binder,
  pub env: Env<'t>,
}

/// A `Type` represents one of the six RPAL value types.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Type {
  Integer,
  Truthvalue,
  String,
  Tuple,
  Function,
  Dummy,
}

impl Type {
  pub fn name(self) -> &'static str {
    match self {
      Type::Integer => "integer",
      Type::Truthvalue => "truthvalue",
      Type::String => "string",
      Type::Tuple => "tuple",
      Type::Function => "function",
      Type::Dummy => "dummy",
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// The functions every program can call without defining them.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Builtin {
  Print,
  Isinteger,
  Istruthvalue,
  Isstring,
  Istuple,
  Isfunction,
  Isdummy,
  Stem,
  Stern,
  Order,
  Conc,
  ItoS,
  Null,
}

impl Builtin {
  /// Every built-in, in lookup order.
  pub const ALL: [Builtin; 13] = [
    Builtin::Print,
    Builtin::Isinteger,
    Builtin::Istruthvalue,
    Builtin::Isstring,
    Builtin::Istuple,
    Builtin::Isfunction,
    Builtin::Isdummy,
    Builtin::Stem,
    Builtin::Stern,
    Builtin::Order,
    Builtin::Conc,
    Builtin::ItoS,
    Builtin::Null,
  ];

  /// Looks up the built-in spelled `name`.
  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.iter().copied().find(|b| b.name() == name)
  }

  pub fn name(self) -> &'static str {
    match self {
      Builtin::Print => "Print",
      Builtin::Isinteger => "Isinteger",
      Builtin::Istruthvalue => "Istruthvalue",
      Builtin::Isstring => "Isstring",
      Builtin::Istuple => "Istuple",
      Builtin::Isfunction => "Isfunction",
      Builtin::Isdummy => "Isdummy",
      Builtin::Stem => "Stem",
      Builtin::Stern => "Stern",
      Builtin::Order => "Order",
      Builtin::Conc => "Conc",
      Builtin::ItoS => "ItoS",
      Builtin::Null => "Null",
    }
  }
}

/// Resolves the escape sequences of a string literal.
pub fn unescape(text: &str) -> String {
  let mut buf = String::with_capacity(text.len());
  let mut chars = text.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      buf.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => buf.push('\n'),
      Some('t') => buf.push('\t'),
      Some('\\') => buf.push('\\'),
      Some('\'') => buf.push('\''),
      Some(other) => {
        buf.push('\\');
        buf.push(other);
      }
      None => buf.push('\\'),
    }
  }
  buf
}
