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

//! Interpreter for the RPAL language.
//!
//! Evaluation runs in three stages: the parsed tree is standardized in place,
//! flattened into a table of control structures, and then executed by the
//! machine in `machine`.

use std::io;

use crate::eval::control::ControlTable;
use crate::eval::error::Error;
use crate::eval::error::EvalError;
use crate::eval::machine::Machine;
use crate::eval::value::Value;
use crate::syn;
use crate::syn::Node;

#[macro_use]
pub mod error;

pub mod control;
pub mod env;
pub mod machine;
pub mod ops;
pub mod standardize;
pub mod value;

#[cfg(test)]
mod conformance;

/// What integer division by zero does.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum DivisionPolicy {
  /// Division by zero is a fatal `EvalError::DivisionByZero`.
  #[default]
  Strict,
  /// Division by zero is logged, and evaluates to `0`.
  Lenient,
}

/// Options for a single evaluation.
#[derive(Copy, Clone, Debug)]
pub struct Options {
  pub division: DivisionPolicy,
  /// The most standardization passes to run before giving up on reaching a
  /// fixed point.
  pub max_passes: usize,
}

impl Default for Options {
  fn default() -> Self {
    Options {
      division: DivisionPolicy::default(),
      max_passes: standardize::DEFAULT_MAX_PASSES,
    }
  }
}

/// Standardizes `tree` and builds its control structures.
pub fn compile(mut tree: Node, opts: &Options) -> Result<ControlTable, EvalError> {
  standardize::standardize(&mut tree, opts.max_passes);
  ControlTable::build(&tree)
}

/// Runs a compiled program, writing its `Print` output to `out`. Returns the
/// value of the program's top-level expression.
pub fn run<'t>(
  table: &'t ControlTable,
  opts: &Options,
  out: impl io::Write,
) -> Result<Value<'t>, EvalError> {
  Machine::new(table, opts.division, out).run()
}

/// The result of running a program with `run_str()`.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Output {
  /// Everything the program printed.
  pub printed: String,
  /// The final value, if it was not `dummy`.
  pub value: Option<String>,
}

/// Parses, compiles, and runs `source`, capturing its output.
pub fn run_str(source: &str, opts: &Options) -> Result<Output, Error> {
  let tree = syn::parse(source)?;
  let table = compile(tree, opts)?;

  let mut printed = Vec::new();
  let value = run(&table, opts, &mut printed)?;
  Ok(Output {
    printed: String::from_utf8_lossy(&printed).into_owned(),
    value: match value {
      Value::Dummy => None,
      v => Some(v.to_string()),
    },
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  use pretty_assertions::assert_eq;

  #[test]
  fn let_scenario() {
    let tree = syn::parse("let x = 3 in Print(x + 4)").unwrap();
    let table = compile(tree, &Options::default()).unwrap();
    assert_eq!(table.len(), 2);

    let mut out = Vec::new();
    let value = run(&table, &Options::default(), &mut out).unwrap();
    assert_eq!(out, b"7");
    assert!(matches!(value, Value::Dummy));
  }

  #[test]
  fn output_and_value() {
    let out = run_str("Print 'hi' ; 1", &Options::default());
    assert!(matches!(out, Err(Error::Parse(_))));

    let out = run_str("(Print 'hi', 2) 2", &Options::default()).unwrap();
    assert_eq!(
      out,
      Output {
        printed: "hi".to_string(),
        value: Some("2".to_string()),
      }
    );
  }

  #[test]
  fn division_policy_is_honored() {
    let strict = run_str("Print (7 / 0)", &Options::default());
    assert!(matches!(
      strict,
      Err(Error::Eval(EvalError::DivisionByZero))
    ));

    let lenient = Options {
      division: DivisionPolicy::Lenient,
      ..Options::default()
    };
    let out = run_str("Print (7 / 0)", &lenient).unwrap();
    assert_eq!(out.printed, "0");
  }
}
