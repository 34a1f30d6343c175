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

//! Syntax tree data structures for the RPAL language.
//!
//! Every tree in the pipeline (the parsed tree, the standardized tree, and the
//! trees that control-structure generation reads) is made of a single node
//! type, `Node`, which encodes an ordered n-ary tree as a binary one: each node
//! owns its first child and its next sibling.

#![deny(missing_docs)]

use std::fmt;

mod parser;
pub use parser::{parse, ParseError};

/// The semantic role of a `Node`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Tag {
  /// A keyword or structural node, such as `let`, `gamma`, or `true`.
  Keyword,
  /// An identifier.
  Ident,
  /// An integer literal.
  Int,
  /// A string literal. The value is the text between the quotes, with
  /// escape sequences left as written.
  Str,
  /// An operator, such as `+`, `gr`, or `neg`.
  Operator,
  /// Punctuation: the `,` of a tuple binder, or the empty binder `()`.
  Punct,
  /// A node that only standardization introduces, namely `YSTAR`.
  Internal,
}

/// A node in a first-child/next-sibling encoded tree.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Node {
  /// The node's semantic role.
  pub tag: Tag,
  /// The node's text: a keyword, a name, or a literal's spelling.
  pub value: String,
  /// The first child, if any. The remaining children hang off its `sibling`
  /// chain.
  pub child: Option<Box<Node>>,
  /// The next node in the parent's child list.
  pub sibling: Option<Box<Node>>,
}

impl Node {
  /// Creates a new leaf.
  pub fn new(tag: Tag, value: impl Into<String>) -> Self {
    Node {
      tag,
      value: value.into(),
      child: None,
      sibling: None,
    }
  }

  /// Creates a new node whose children are `children`, in order.
  pub fn branch(tag: Tag, value: impl Into<String>, children: Vec<Node>) -> Self {
    let mut node = Node::new(tag, value);
    node.set_children(children);
    node
  }

  /// Creates a keyword node with the given children.
  pub fn keyword(value: &str, children: Vec<Node>) -> Self {
    Node::branch(Tag::Keyword, value, children)
  }

  /// Creates an identifier leaf.
  pub fn ident(name: impl Into<String>) -> Self {
    Node::new(Tag::Ident, name)
  }

  /// Creates an integer leaf.
  pub fn int(value: i64) -> Self {
    Node::new(Tag::Int, value.to_string())
  }

  /// Creates a string leaf from its unquoted text.
  pub fn string(text: impl Into<String>) -> Self {
    Node::new(Tag::Str, text)
  }

  /// Returns whether this node is the structural node or operator `value`.
  ///
  /// Identifiers and literals never match, so a variable that happens to be
  /// named `gamma` is not mistaken for an application.
  pub fn is(&self, value: &str) -> bool {
    !matches!(self.tag, Tag::Ident | Tag::Int | Tag::Str) && self.value == value
  }

  /// Returns an iterator over this node's children.
  pub fn children(&self) -> Children<'_> {
    Children {
      next: self.child.as_deref(),
    }
  }

  /// Returns the `n`th child, zero-indexed.
  pub fn nth_child(&self, n: usize) -> Option<&Node> {
    self.children().nth(n)
  }

  /// Returns the number of children.
  pub fn child_count(&self) -> usize {
    self.children().count()
  }

  /// Detaches this node's children, returning them as a list of unlinked
  /// nodes.
  pub fn take_children(&mut self) -> Vec<Node> {
    let mut children = Vec::new();
    let mut next = self.child.take();
    while let Some(mut node) = next {
      next = node.sibling.take();
      children.push(*node);
    }
    children
  }

  /// Replaces this node's children with `children`, linking them into a
  /// sibling chain. The sibling link of this node itself is untouched.
  pub fn set_children(&mut self, children: Vec<Node>) {
    let mut chain = None;
    for mut node in children.into_iter().rev() {
      node.sibling = chain;
      chain = Some(Box::new(node));
    }
    self.child = chain;
  }

  /// Returns this tree in the dotted, one-node-per-line diagnostic format.
  pub fn dump(&self) -> String {
    let mut buf = String::new();
    // Writing to a `String` cannot fail.
    let _ = self.write_dotted(&mut buf, 0);
    buf
  }

  fn write_dotted(&self, w: &mut impl fmt::Write, depth: usize) -> fmt::Result {
    for _ in 0..depth {
      w.write_char('.')?;
    }
    match self.tag {
      Tag::Ident => writeln!(w, "<ID:{}>", self.value)?,
      Tag::Int => writeln!(w, "<INT:{}>", self.value)?,
      Tag::Str => writeln!(w, "<STR:'{}'>", self.value)?,
      Tag::Internal if self.value == "YSTAR" => writeln!(w, "<Y*>")?,
      Tag::Keyword
        if matches!(self.value.as_str(), "true" | "false" | "nil" | "dummy") =>
      {
        writeln!(w, "<{}>", self.value)?
      }
      _ => writeln!(w, "{}", self.value)?,
    }
    for child in self.children() {
      child.write_dotted(w, depth + 1)?;
    }
    Ok(())
  }
}

impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    self.write_dotted(f, 0)
  }
}

/// An iterator over the children of a `Node`.
pub struct Children<'a> {
  next: Option<&'a Node>,
}

impl<'a> Iterator for Children<'a> {
  type Item = &'a Node;

  fn next(&mut self) -> Option<&'a Node> {
    let node = self.next?;
    self.next = node.sibling.as_deref();
    Some(node)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use pretty_assertions::assert_eq;

  #[test]
  fn children_round_trip_through_the_sibling_chain() {
    let mut node = Node::keyword(
      "tau",
      vec![Node::int(1), Node::ident("x"), Node::string("s")],
    );
    assert_eq!(node.child_count(), 3);
    assert_eq!(node.nth_child(1), Some(&Node::ident("x")));

    let children = node.take_children();
    assert_eq!(node.child, None);
    assert!(children.iter().all(|c| c.sibling.is_none()));

    node.set_children(children);
    let values = node.children().map(|c| c.value.as_str()).collect::<Vec<_>>();
    assert_eq!(values, vec!["1", "x", "s"]);
  }

  #[test]
  fn identifiers_never_match_structural_names() {
    assert!(Node::keyword("gamma", vec![]).is("gamma"));
    assert!(!Node::ident("gamma").is("gamma"));
  }

  #[test]
  fn dump_uses_one_dot_per_level() {
    let tree = Node::keyword(
      "let",
      vec![
        Node::keyword("=", vec![Node::ident("x"), Node::int(3)]),
        Node::keyword("nil", vec![]),
      ],
    );
    assert_eq!(tree.dump(), "let\n.=\n..<ID:x>\n..<INT:3>\n.<nil>\n");
  }
}
