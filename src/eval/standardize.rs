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

//! Standardization: rewriting RPAL's surface idioms into the canonical tree.
//!
//! After standardization a tree contains only `gamma`, single-parameter
//! `lambda`, `tau`, `->`, `aug`, operators, identifiers, literals, and
//! `YSTAR`. Rules apply bottom-up; a node whose children do not have the shape
//! a rule expects is left alone, and the malformed remainder is reported later
//! by control-structure generation.

use std::convert::TryFrom;

use crate::syn::Node;
use crate::syn::Tag;

/// The default bound on standardization passes.
pub const DEFAULT_MAX_PASSES: usize = 64;

/// Standardizes `tree` in place.
///
/// Passes are repeated until one makes no change, or until `max_passes` have
/// run. Returns the number of passes that rewrote something.
pub fn standardize(tree: &mut Node, max_passes: usize) -> usize {
  for pass in 0..max_passes {
    if !rewrite_tree(tree) {
      tracing::debug!(passes = pass, "tree standardized");
      return pass;
    }
  }
  tracing::warn!(max_passes, "standardization did not reach a fixed point");
  max_passes
}

/// Runs one post-order pass over `node` and its descendants.
fn rewrite_tree(node: &mut Node) -> bool {
  let mut changed = false;
  let mut cursor = node.child.as_deref_mut();
  while let Some(child) = cursor {
    changed |= rewrite_tree(child);
    cursor = child.sibling.as_deref_mut();
  }
  rewrite(node) || changed
}

/// The outcome of a rule: the node's new value and children, or the original
/// children, handed back untouched, when the rule does not apply.
type Rewrite = Result<(&'static str, Vec<Node>), Vec<Node>>;

fn rewrite(node: &mut Node) -> bool {
  if node.tag != Tag::Keyword {
    return false;
  }

  let rule: fn(Vec<Node>) -> Rewrite = match node.value.as_str() {
    "let" => let_in,
    "where" => where_clause,
    "and" => simultaneous,
    "within" => within,
    "rec" => rec,
    "fcn_form" => function_form,
    "lambda" => curry,
    "@" => infix,
    _ => return false,
  };

  match rule(node.take_children()) {
    Ok((value, children)) => {
      tracing::trace!(from = %node.value, to = value, "rewrote node");
      node.value = value.to_string();
      node.set_children(children);
      true
    }
    Err(children) => {
      node.set_children(children);
      false
    }
  }
}

fn exact<const N: usize>(children: Vec<Node>) -> Result<[Node; N], Vec<Node>> {
  <[Node; N]>::try_from(children)
}

fn is_binding(node: &Node) -> bool {
  node.is("=") && node.child_count() == 2
}

/// Splits `X = E` into `(X, E)`.
fn binding(mut node: Node) -> Result<(Node, Node), Node> {
  if !is_binding(&node) {
    return Err(node);
  }
  match exact(node.take_children()) {
    Ok([name, value]) => Ok((name, value)),
    Err(children) => {
      node.set_children(children);
      Err(node)
    }
  }
}

fn lambda(param: Node, body: Node) -> Node {
  Node::keyword("lambda", vec![param, body])
}

fn gamma(rator: Node, rand: Node) -> Node {
  Node::keyword("gamma", vec![rator, rand])
}

/// Nests `params` into single-parameter lambdas around `body`.
fn nest(params: Vec<Node>, body: Node) -> Node {
  params.into_iter().rev().fold(body, |body, param| lambda(param, body))
}

/// `let X = E in P` => `gamma(lambda(X, P), E)`.
fn let_in(children: Vec<Node>) -> Rewrite {
  let [def, body] = exact(children)?;
  match binding(def) {
    Ok((name, value)) => Ok(("gamma", vec![lambda(name, body), value])),
    Err(def) => Err(vec![def, body]),
  }
}

/// `P where X = E` => `gamma(lambda(X, P), E)`.
fn where_clause(children: Vec<Node>) -> Rewrite {
  let [body, def] = exact(children)?;
  match binding(def) {
    Ok((name, value)) => Ok(("gamma", vec![lambda(name, body), value])),
    Err(def) => Err(vec![body, def]),
  }
}

/// `X1 = E1 and ... and Xn = En` => `(X1, ..., Xn) = tau(E1, ..., En)`.
fn simultaneous(children: Vec<Node>) -> Rewrite {
  if children.len() < 2 || !children.iter().all(is_binding) {
    return Err(children);
  }

  let mut names = Vec::with_capacity(children.len());
  let mut values = Vec::with_capacity(children.len());
  for def in children {
    match binding(def) {
      Ok((name, value)) => {
        names.push(name);
        values.push(value);
      }
      // Every child was checked above.
      Err(_) => unreachable!(),
    }
  }

  Ok((
    "=",
    vec![
      Node::branch(Tag::Punct, ",", names),
      Node::keyword("tau", values),
    ],
  ))
}

/// `X1 = E1 within X2 = E2` => `X2 = gamma(lambda(X1, E2), E1)`.
fn within(children: Vec<Node>) -> Rewrite {
  let [inner, outer] = exact(children)?;
  if !is_binding(&inner) || !is_binding(&outer) {
    return Err(vec![inner, outer]);
  }
  match (binding(inner), binding(outer)) {
    (Ok((x1, e1)), Ok((x2, e2))) => {
      Ok(("=", vec![x2, gamma(lambda(x1, e2), e1)]))
    }
    _ => unreachable!(),
  }
}

/// `rec X = E` => `X = gamma(YSTAR, lambda(X, E))`.
fn rec(children: Vec<Node>) -> Rewrite {
  let [def] = exact(children)?;
  match binding(def) {
    Ok((name, value)) => {
      let ystar = Node::new(Tag::Internal, "YSTAR");
      let fixed = gamma(ystar, lambda(name.clone(), value));
      Ok(("=", vec![name, fixed]))
    }
    Err(def) => Err(vec![def]),
  }
}

/// `f V1 ... Vn = E` => `f = lambda(V1, ... lambda(Vn, E))`.
fn function_form(mut children: Vec<Node>) -> Rewrite {
  if children.len() < 3 {
    return Err(children);
  }
  let body = children.pop();
  let mut params = children.into_iter();
  match (params.next(), body) {
    (Some(name), Some(body)) => {
      Ok(("=", vec![name, nest(params.collect(), body)]))
    }
    _ => unreachable!(),
  }
}

/// `fn V1 ... Vn . E` => `lambda(V1, ... lambda(Vn, E))`.
fn curry(mut children: Vec<Node>) -> Rewrite {
  if children.len() <= 2 {
    return Err(children);
  }
  let body = children.pop();
  let mut params = children.into_iter();
  match (params.next(), body) {
    (Some(first), Some(body)) => {
      Ok(("lambda", vec![first, nest(params.collect(), body)]))
    }
    _ => unreachable!(),
  }
}

/// `E1 @ N E2` => `gamma(gamma(N, E1), E2)`.
fn infix(children: Vec<Node>) -> Rewrite {
  let [lhs, name, rhs] = exact(children)?;
  Ok(("gamma", vec![gamma(name, lhs), rhs]))
}

#[cfg(test)]
mod tests {
  use super::*;

  use pretty_assertions::assert_eq;

  use crate::syn;

  fn standardized(src: &str) -> Node {
    let mut tree = match syn::parse(src) {
      Ok(tree) => tree,
      Err(e) => panic!("failed to parse {:?}: {}", src, e),
    };
    standardize(&mut tree, DEFAULT_MAX_PASSES);
    tree
  }

  #[test]
  fn let_becomes_an_applied_lambda() {
    assert_eq!(
      standardized("let x = 3 in Print(x + 4)").dump(),
      "\
gamma
.lambda
..<ID:x>
..gamma
...<ID:Print>
...+
....<ID:x>
....<INT:4>
.<INT:3>
"
    );
  }

  #[test]
  fn second_pass_is_a_no_op() {
    let mut tree = standardized("let x = 3 in let y = x in x + y");
    let before = tree.clone();
    assert_eq!(standardize(&mut tree, DEFAULT_MAX_PASSES), 0);
    assert_eq!(tree, before);
  }

  #[test]
  fn currying_law() {
    let body = || Node::ident("E");
    let mut spread = Node::keyword(
      "fcn_form",
      vec![Node::ident("f"), Node::ident("x"), Node::ident("y"), body()],
    );
    let mut nested = Node::keyword(
      "fcn_form",
      vec![
        Node::ident("f"),
        Node::ident("x"),
        Node::keyword("lambda", vec![Node::ident("y"), body()]),
      ],
    );
    standardize(&mut spread, DEFAULT_MAX_PASSES);
    standardize(&mut nested, DEFAULT_MAX_PASSES);
    assert_eq!(spread, nested);
    assert_eq!(
      spread.dump(),
      "=\n.<ID:f>\n.lambda\n..<ID:x>\n..lambda\n...<ID:y>\n...<ID:E>\n"
    );
  }

  #[test]
  fn multi_parameter_lambda_is_curried() {
    assert_eq!(
      standardized("fn x y z . x").dump(),
      "\
lambda
.<ID:x>
.lambda
..<ID:y>
..lambda
...<ID:z>
...<ID:x>
"
    );
  }

  #[test]
  fn rec_introduces_the_fixed_point() {
    assert_eq!(
      standardized("let rec f n = f n in f").dump(),
      "\
gamma
.lambda
..<ID:f>
..<ID:f>
.gamma
..<Y*>
..lambda
...<ID:f>
...lambda
....<ID:n>
....gamma
.....<ID:f>
.....<ID:n>
"
    );
  }

  #[test]
  fn and_binds_simultaneously() {
    assert_eq!(
      standardized("let a = 1 and b = 2 in a").dump(),
      "\
gamma
.lambda
..,
...<ID:a>
...<ID:b>
..<ID:a>
.tau
..<INT:1>
..<INT:2>
"
    );
  }

  #[test]
  fn within_scopes_one_binding_into_another() {
    assert_eq!(
      standardized("let a = 1 within b = a in b").dump(),
      "\
gamma
.lambda
..<ID:b>
..<ID:b>
.gamma
..lambda
...<ID:a>
...<ID:a>
..<INT:1>
"
    );
  }

  #[test]
  fn where_and_infix_application() {
    assert_eq!(
      standardized("x @add y where add = 1").dump(),
      "\
gamma
.lambda
..<ID:add>
..gamma
...gamma
....<ID:add>
....<ID:x>
...<ID:y>
.<INT:1>
"
    );
  }

  #[test]
  fn malformed_let_is_left_alone() {
    let mut tree = Node::keyword("let", vec![Node::ident("x"), Node::int(1)]);
    let before = tree.clone();
    assert_eq!(standardize(&mut tree, DEFAULT_MAX_PASSES), 0);
    assert_eq!(tree, before);
  }

  #[test]
  fn sibling_links_survive_rewrites() {
    // The rewritten `let` is the first of three tuple elements.
    let tree = standardized("(let x = 1 in x), 2, 3");
    assert!(tree.is("tau"));
    assert_eq!(tree.child_count(), 3);
    assert!(tree.nth_child(0).map_or(false, |n| n.is("gamma")));
  }
}
