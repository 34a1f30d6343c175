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

//! Control-structure generation.
//!
//! A standardized tree is flattened, in pre-order, into a table of control
//! structures: one for the program itself, one for each lambda body, and one
//! for each arm of each conditional. The machine executes a structure by
//! pushing its cells onto the control stack and popping them from the tail,
//! so a cell's operands always appear after it in the structure.

use std::fmt;
use std::rc::Rc;

use crate::eval::error::EvalError;
use crate::eval::ops::BinOp;
use crate::eval::ops::UnOp;
use crate::eval::value::unescape;
use crate::syn::Node;
use crate::syn::Tag;

/// The names a lambda binds when it is applied.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Binder {
  /// A single name, bound to the whole argument.
  Name(String),
  /// `a, b, ...`, bound element-wise to a tuple argument.
  Tuple(Vec<String>),
  /// `()`, which binds nothing.
  Empty,
}

impl Binder {
  fn from_node(node: &Node) -> Result<Self, EvalError> {
    match node.tag {
      Tag::Ident => Ok(Binder::Name(node.value.clone())),
      Tag::Punct if node.value == "()" => Ok(Binder::Empty),
      Tag::Punct if node.value == "," => {
        let mut names = Vec::with_capacity(node.child_count());
        for child in node.children() {
          if child.tag != Tag::Ident {
            error!(Structural, "expected a name in binder, got `{}`", child.value)
          }
          names.push(child.value.clone());
        }
        Ok(Binder::Tuple(names))
      }
      _ => error!(Structural, "`{}` cannot be a lambda parameter", node.value),
    }
  }
}

impl fmt::Display for Binder {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Binder::Name(name) => write!(f, "{}", name),
      Binder::Tuple(names) => write!(f, "{}", names.join(", ")),
      Binder::Empty => write!(f, "()"),
    }
  }
}

/// One instruction of a control structure.
#[derive(Clone, PartialEq, Debug)]
pub enum Cell {
  /// The index of another control structure.
  Delta(usize),
  /// The parameter of the `Lambda` that follows it.
  Binder(Binder),
  Lambda,
  Beta,
  /// The order of the tuple built by the `Tau` that follows it.
  Count(usize),
  Tau,
  Gamma,
  YStar,
  Aug,
  Name(String),
  Int(i64),
  Str(Rc<str>),
  Bool(bool),
  Nil,
  Dummy,
  BinOp(BinOp),
  UnOp(UnOp),
}

impl fmt::Display for Cell {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Cell::Delta(k) => write!(f, "delta{}", k),
      Cell::Binder(b) => write!(f, "[{}]", b),
      Cell::Lambda => write!(f, "lambda"),
      Cell::Beta => write!(f, "beta"),
      Cell::Count(n) => write!(f, "{}", n),
      Cell::Tau => write!(f, "tau"),
      Cell::Gamma => write!(f, "gamma"),
      Cell::YStar => write!(f, "<Y*>"),
      Cell::Aug => write!(f, "aug"),
      Cell::Name(name) => write!(f, "<ID:{}>", name),
      Cell::Int(n) => write!(f, "<INT:{}>", n),
      Cell::Str(s) => write!(f, "<STR:'{}'>", s.escape_debug()),
      Cell::Bool(b) => write!(f, "<{}>", b),
      Cell::Nil => write!(f, "<nil>"),
      Cell::Dummy => write!(f, "<dummy>"),
      Cell::BinOp(op) => write!(f, "{}", op),
      Cell::UnOp(op) => write!(f, "{}", op),
    }
  }
}

/// The control structures of one program. Structure 0 is the program's
/// top level.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ControlTable {
  structures: Vec<Vec<Cell>>,
}

impl ControlTable {
  /// Flattens a standardized tree into a table.
  ///
  /// Nodes that standardization should have removed, and nodes with the wrong
  /// number of children, are reported as `EvalError::Structural`.
  pub fn build(tree: &Node) -> Result<Self, EvalError> {
    let mut table = ControlTable {
      structures: vec![Vec::new()],
    };
    table.encode(tree, 0)?;
    tracing::debug!(structures = table.len(), "built control structures");
    Ok(table)
  }

  /// Returns the number of structures in the table.
  pub fn len(&self) -> usize {
    self.structures.len()
  }

  pub fn is_empty(&self) -> bool {
    self.structures.is_empty()
  }

  /// Returns the cells of structure `index`.
  pub fn get(&self, index: usize) -> Option<&[Cell]> {
    self.structures.get(index).map(Vec::as_slice)
  }

  fn alloc(&mut self) -> usize {
    self.structures.push(Vec::new());
    self.structures.len() - 1
  }

  fn emit(&mut self, slot: usize, cell: Cell) -> usize {
    let cells = &mut self.structures[slot];
    cells.push(cell);
    cells.len() - 1
  }

  fn encode(&mut self, node: &Node, slot: usize) -> Result<(), EvalError> {
    let children: Vec<&Node> = node.children().collect();
    let arity = |n: usize| -> Result<(), EvalError> {
      if children.len() != n {
        error!(
          Structural,
          "`{}` expects {} operands, found {}",
          node.value,
          n,
          children.len()
        )
      }
      Ok(())
    };

    match node.tag {
      Tag::Ident => {
        arity(0)?;
        self.emit(slot, Cell::Name(node.value.clone()));
        return Ok(());
      }
      Tag::Int => {
        arity(0)?;
        let n = match node.value.parse() {
          Ok(n) => n,
          Err(_) => error!(Structural, "bad integer literal `{}`", node.value),
        };
        self.emit(slot, Cell::Int(n));
        return Ok(());
      }
      Tag::Str => {
        arity(0)?;
        self.emit(slot, Cell::Str(unescape(&node.value).into()));
        return Ok(());
      }
      _ => {}
    }

    let cell = match node.value.as_str() {
      "lambda" => {
        arity(2)?;
        let body = self.alloc();
        self.emit(slot, Cell::Delta(body));
        self.emit(slot, Cell::Binder(Binder::from_node(children[0])?));
        self.emit(slot, Cell::Lambda);
        return self.encode(children[1], body);
      }
      "->" => {
        arity(3)?;
        let then_at = self.emit(slot, Cell::Delta(0));
        let else_at = self.emit(slot, Cell::Delta(0));
        self.emit(slot, Cell::Beta);
        self.encode(children[0], slot)?;

        let then = self.alloc();
        self.encode(children[1], then)?;
        let otherwise = self.alloc();
        self.encode(children[2], otherwise)?;

        self.structures[slot][then_at] = Cell::Delta(then);
        self.structures[slot][else_at] = Cell::Delta(otherwise);
        return Ok(());
      }
      "tau" => {
        self.emit(slot, Cell::Count(children.len()));
        Cell::Tau
      }
      "gamma" => {
        arity(2)?;
        Cell::Gamma
      }
      "aug" => {
        arity(2)?;
        Cell::Aug
      }
      "YSTAR" if node.tag == Tag::Internal => {
        arity(0)?;
        Cell::YStar
      }
      "true" | "false" | "nil" | "dummy" if node.tag == Tag::Keyword => {
        arity(0)?;
        match node.value.as_str() {
          "true" => Cell::Bool(true),
          "false" => Cell::Bool(false),
          "nil" => Cell::Nil,
          _ => Cell::Dummy,
        }
      }
      op if node.tag == Tag::Operator => {
        if let Some(op) = UnOp::from_name(op) {
          arity(1)?;
          Cell::UnOp(op)
        } else if let Some(op) = BinOp::from_name(op) {
          arity(2)?;
          Cell::BinOp(op)
        } else {
          error!(Structural, "unknown operator `{}`", op)
        }
      }
      other => error!(Structural, "unexpected `{}` in standardized tree", other),
    };

    self.emit(slot, cell);
    for child in children {
      self.encode(child, slot)?;
    }
    Ok(())
  }
}

impl fmt::Display for ControlTable {
  /// Writes one structure per line.
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    for (i, cells) in self.structures.iter().enumerate() {
      write!(f, "delta{}:", i)?;
      for cell in cells {
        write!(f, " {}", cell)?;
      }
      writeln!(f)?;
    }
    Ok(())
  }
}
