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

//! Error generation for RPAL evaluation.

use std::io;

use crate::syn::ParseError;

/// An `Error` is anything that can stop a program from running to completion,
/// from parsing onwards.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error(transparent)]
  Parse(#[from] ParseError),
  #[error(transparent)]
  Eval(#[from] EvalError),
}

/// An `EvalError` is any error raised while building control structures or
/// running the machine. All of them are fatal to the run that raised them.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
  /// Identifier lookup exhausted the environment chain.
  #[error("unbound identifier `{0}`")]
  Unbound(String),
  /// An operator or built-in was applied to a value of the wrong type.
  #[error("type error: {0}")]
  Type(String),
  /// A rule popped more values than the stack held.
  #[error("stack underflow in {0}")]
  Underflow(&'static str),
  /// A tuple was indexed outside of `1..=order`.
  #[error("tuple index {index} out of range for a tuple of order {order}")]
  Index { index: i64, order: usize },
  /// A tuple binder was applied to a tuple of a different order.
  #[error("cannot bind {expected} names to a tuple of order {found}")]
  Arity { expected: usize, found: usize },
  /// Integer division by zero, under `DivisionPolicy::Strict`.
  #[error("division by zero")]
  DivisionByZero,
  /// Integer overflow, or a negative exponent.
  #[error("arithmetic error: {0}")]
  Arithmetic(String),
  /// The tree handed to control-structure generation was not canonical, or a
  /// control structure was missing the cells a rule expected.
  #[error("malformed program: {0}")]
  Structural(String),
  /// An internal invariant of the machine was violated.
  #[error("internal interpreter error; this is a bug: {0}")]
  Internal(String),
  /// Writing `Print` output failed.
  #[error("cannot write output: {0}")]
  Io(#[from] io::Error),
}

/// Returns, from the enclosing function, an `EvalError` of the given kind with
/// a formatted message.
macro_rules! error {
  ($kind:ident, $($tt:tt)*) => {{
    #[allow(unused_imports)]
    use $crate::eval::error::*;
    return Err(EvalError::$kind(format!($($tt)*)).into())
  }}
}

/// Like `error!`, but for violated internal invariants; these are also logged,
/// since they indicate a bug rather than a bad program.
macro_rules! bug {
  ($($tt:tt)*) => {{
    let message = format!($($tt)*);
    tracing::error!(%message, "internal interpreter error");
    return Err($crate::eval::error::EvalError::Internal(message).into())
  }}
}
