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

//! Runtime environments.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::eval::value;
use crate::eval::value::Value;

/// An `Env` is one scope of a running program: the names bound by a single
/// closure application, plus a link to the scope the closure was defined in.
///
/// `Env`s are reference counted; cloning one is cheap and shares the scope.
/// Many closures, and many child scopes, may hold the same parent. Bindings
/// are fixed when the scope is created.
#[derive(Clone)]
pub struct Env<'t>(Rc<Inner<'t>>);

struct Inner<'t> {
  id: usize,
  parent: Option<Env<'t>>,
  bindings: HashMap<&'t str, Value<'t>>,
}

impl<'t> Env<'t> {
  /// Creates the root environment, which binds nothing.
  pub fn root() -> Self {
    Env(Rc::new(Inner {
      id: 0,
      parent: None,
      bindings: HashMap::new(),
    }))
  }

  /// Creates a new environment with `self` as its parent.
  pub fn extend(
    &self,
    id: usize,
    bindings: HashMap<&'t str, Value<'t>>,
  ) -> Self {
    Env(Rc::new(Inner {
      id,
      parent: Some(self.clone()),
      bindings,
    }))
  }

  /// Returns this environment's ordinal.
  pub fn id(&self) -> usize {
    self.0.id
  }

  /// Returns the parent environment, if this is not the root.
  pub fn parent(&self) -> Option<&Env<'t>> {
    self.0.parent.as_ref()
  }

  /// Gives up this reference. If it was the last one, the scope's bindings
  /// and parent are moved onto the worklists of `value::release`.
  pub(crate) fn unlink(
    self,
    values: &mut Vec<Value<'t>>,
    envs: &mut Vec<Env<'t>>,
  ) {
    if let Ok(mut inner) = Rc::try_unwrap(self.0) {
      values.extend(inner.bindings.drain().map(|(_, v)| v));
      envs.extend(inner.parent.take());
    }
  }

  /// Looks up `name` in this environment and all of its parents.
  pub fn lookup(&self, name: &str) -> Option<Value<'t>> {
    let mut current = self;
    loop {
      if let Some(v) = current.0.bindings.get(name) {
        return Some(v.clone());
      }

      match &current.0.parent {
        Some(parent) => current = parent,
        None => return None,
      }
    }
  }
}

// Closures can chain scopes arbitrarily deep, through both parents and
// bindings.
impl Drop for Inner<'_> {
  fn drop(&mut self) {
    if self.parent.is_none() && self.bindings.is_empty() {
      return;
    }
    let values = self.bindings.drain().map(|(_, v)| v).collect();
    value::release(values, self.parent.take().into_iter().collect());
  }
}

impl fmt::Debug for Env<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "e{}", self.id())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_walks_the_parent_chain() {
    let root = Env::root();
    let mut outer = HashMap::new();
    outer.insert("x", Value::Int(1));
    outer.insert("y", Value::Int(2));
    let outer = root.extend(1, outer);

    let mut inner = HashMap::new();
    inner.insert("x", Value::Int(3));
    let inner = outer.extend(2, inner);

    assert!(matches!(inner.lookup("x"), Some(Value::Int(3))));
    assert!(matches!(inner.lookup("y"), Some(Value::Int(2))));
    assert!(inner.lookup("z").is_none());
    assert_eq!(inner.parent().map(Env::id), Some(1));
  }

  #[test]
  fn long_chains_drop_without_recursing() {
    let mut env = Env::root();
    for id in 1..=200_000 {
      let mut bindings = HashMap::new();
      bindings.insert("x", Value::Int(id as i64));
      env = env.extend(id, bindings);
    }
    assert!(matches!(env.lookup("x"), Some(Value::Int(200_000))));
    drop(env);
  }

  #[test]
  fn siblings_share_a_parent() {
    let root = Env::root();
    let parent = root.extend(1, HashMap::new());
    let a = parent.extend(2, HashMap::new());
    let b = parent.extend(3, HashMap::new());
    drop(parent);
    assert_eq!(a.parent().map(Env::id), b.parent().map(Env::id));
  }
}
