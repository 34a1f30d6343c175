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

//! Unary and binary operators.

use std::convert::TryFrom;
use std::fmt;

use crate::eval::error::EvalError;
use crate::eval::value::Value;
use crate::eval::DivisionPolicy;

/// A binary operator.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  Pow,
  Gr,
  Ge,
  Ls,
  Le,
  Eq,
  Ne,
  And,
  Or,
}

impl BinOp {
  /// Parses an operator token, accepting the symbolic aliases of the
  /// relational operators.
  pub fn from_name(name: &str) -> Option<Self> {
    let op = match name {
      "+" => BinOp::Add,
      "-" => BinOp::Sub,
      "*" => BinOp::Mul,
      "/" => BinOp::Div,
      "**" => BinOp::Pow,
      "gr" | ">" => BinOp::Gr,
      "ge" | ">=" => BinOp::Ge,
      "ls" | "<" => BinOp::Ls,
      "le" | "<=" => BinOp::Le,
      "eq" => BinOp::Eq,
      "ne" => BinOp::Ne,
      "&" => BinOp::And,
      "or" => BinOp::Or,
      _ => return None,
    };
    Some(op)
  }

  pub fn name(self) -> &'static str {
    match self {
      BinOp::Add => "+",
      BinOp::Sub => "-",
      BinOp::Mul => "*",
      BinOp::Div => "/",
      BinOp::Pow => "**",
      BinOp::Gr => "gr",
      BinOp::Ge => "ge",
      BinOp::Ls => "ls",
      BinOp::Le => "le",
      BinOp::Eq => "eq",
      BinOp::Ne => "ne",
      BinOp::And => "&",
      BinOp::Or => "or",
    }
  }

  /// Applies this operator to `lhs` and `rhs`.
  pub fn apply<'t>(
    self,
    lhs: Value<'t>,
    rhs: Value<'t>,
    division: DivisionPolicy,
  ) -> Result<Value<'t>, EvalError> {
    use BinOp::*;
    match (self, &lhs, &rhs) {
      (Eq, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a == b)),
      (Ne, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a != b)),
      (Eq, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a == b)),
      (Ne, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a != b)),
      (And, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
      (Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
      (_, Value::Int(a), Value::Int(b)) => self.integer(*a, *b, division),
      _ => error!(
        Type,
        "cannot apply `{}` to {} and {}",
        self,
        lhs.ty(),
        rhs.ty()
      ),
    }
  }

  fn integer<'t>(
    self,
    a: i64,
    b: i64,
    division: DivisionPolicy,
  ) -> Result<Value<'t>, EvalError> {
    let checked = match self {
      BinOp::Add => a.checked_add(b),
      BinOp::Sub => a.checked_sub(b),
      BinOp::Mul => a.checked_mul(b),
      BinOp::Div if b == 0 => match division {
        DivisionPolicy::Strict => return Err(EvalError::DivisionByZero),
        DivisionPolicy::Lenient => {
          tracing::warn!(dividend = a, "division by zero; continuing with 0");
          Some(0)
        }
      },
      BinOp::Div => a.checked_div(b),
      BinOp::Pow => {
        match u32::try_from(b) {
          Ok(exp) => a.checked_pow(exp),
          Err(_) if b < 0 => error!(Arithmetic, "negative exponent {}", b),
          // Only these bases stay in range past a `u32` exponent.
          Err(_) => match a {
            0 | 1 => Some(a),
            -1 if b % 2 == 0 => Some(1),
            -1 => Some(-1),
            _ => None,
          },
        }
      }
      BinOp::Gr => return Ok(Value::Bool(a > b)),
      BinOp::Ge => return Ok(Value::Bool(a >= b)),
      BinOp::Ls => return Ok(Value::Bool(a < b)),
      BinOp::Le => return Ok(Value::Bool(a <= b)),
      BinOp::Eq => return Ok(Value::Bool(a == b)),
      BinOp::Ne => return Ok(Value::Bool(a != b)),
      BinOp::And | BinOp::Or => {
        error!(Type, "cannot apply `{}` to integer and integer", self)
      }
    };

    match checked {
      Some(n) => Ok(Value::Int(n)),
      None => error!(Arithmetic, "overflow in {} {} {}", a, self, b),
    }
  }
}

impl fmt::Display for BinOp {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// A unary operator.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum UnOp {
  Neg,
  Not,
}

impl UnOp {
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "neg" => Some(UnOp::Neg),
      "not" => Some(UnOp::Not),
      _ => None,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      UnOp::Neg => "neg",
      UnOp::Not => "not",
    }
  }

  /// Applies this operator to `arg`.
  pub fn apply<'t>(self, arg: Value<'t>) -> Result<Value<'t>, EvalError> {
    match (self, &arg) {
      (UnOp::Neg, Value::Int(n)) => match n.checked_neg() {
        Some(n) => Ok(Value::Int(n)),
        None => error!(Arithmetic, "overflow in neg {}", n),
      },
      (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
      _ => error!(Type, "cannot apply `{}` to {}", self, arg.ty()),
    }
  }
}

impl fmt::Display for UnOp {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use pretty_assertions::assert_eq;

  fn int(op: BinOp, a: i64, b: i64) -> Result<String, String> {
    op.apply(Value::Int(a), Value::Int(b), DivisionPolicy::Strict)
      .map(|v| v.to_string())
      .map_err(|e| e.to_string())
  }

  #[test]
  fn arithmetic() {
    assert_eq!(int(BinOp::Add, 3, 4), Ok("7".to_string()));
    assert_eq!(int(BinOp::Sub, 3, 4), Ok("-1".to_string()));
    assert_eq!(int(BinOp::Div, 7, 2), Ok("3".to_string()));
    assert_eq!(int(BinOp::Pow, 2, 10), Ok("1024".to_string()));
    assert_eq!(int(BinOp::Pow, -1, 2), Ok("1".to_string()));
    assert_eq!(int(BinOp::Pow, -1, 4_294_967_296), Ok("1".to_string()));
    assert_eq!(int(BinOp::Pow, -1, 4_294_967_297), Ok("-1".to_string()));
    assert_eq!(int(BinOp::Pow, 0, 4_294_967_296), Ok("0".to_string()));
    assert_eq!(int(BinOp::Pow, 1, i64::MAX), Ok("1".to_string()));
    assert!(int(BinOp::Pow, 2, 4_294_967_296).is_err());
    assert_eq!(int(BinOp::Ge, 2, 2), Ok("true".to_string()));
  }

  #[test]
  fn arithmetic_faults() {
    assert!(matches!(
      BinOp::Div.apply(Value::Int(1), Value::Int(0), DivisionPolicy::Strict),
      Err(EvalError::DivisionByZero)
    ));
    assert!(matches!(
      BinOp::Div.apply(Value::Int(1), Value::Int(0), DivisionPolicy::Lenient),
      Ok(Value::Int(0))
    ));
    assert!(matches!(
      BinOp::Pow.apply(Value::Int(2), Value::Int(-1), DivisionPolicy::Strict),
      Err(EvalError::Arithmetic(_))
    ));
    assert!(matches!(
      BinOp::Mul.apply(
        Value::Int(i64::MAX),
        Value::Int(2),
        DivisionPolicy::Strict
      ),
      Err(EvalError::Arithmetic(_))
    ));
    assert!(matches!(
      UnOp::Neg.apply(Value::Int(i64::MIN)),
      Err(EvalError::Arithmetic(_))
    ));
  }

  #[test]
  fn equality_on_strings_and_bools() {
    let eq = |a: Value<'static>, b: Value<'static>| {
      BinOp::Eq
        .apply(a, b, DivisionPolicy::Strict)
        .map(|v| v.to_string())
        .map_err(|e| e.to_string())
    };
    assert_eq!(
      eq(Value::Str("a".into()), Value::Str("a".into())),
      Ok("true".to_string())
    );
    assert_eq!(
      eq(Value::Bool(true), Value::Bool(false)),
      Ok("false".to_string())
    );
    assert!(eq(Value::Str("1".into()), Value::Int(1)).is_err());
  }

  #[test]
  fn aliases() {
    assert_eq!(BinOp::from_name(">="), Some(BinOp::Ge));
    assert_eq!(BinOp::from_name("ls"), Some(BinOp::Ls));
    assert_eq!(BinOp::from_name("neg"), None);
    assert_eq!(UnOp::from_name("neg"), Some(UnOp::Neg));
  }

  #[test]
  fn type_errors() {
    assert!(matches!(
      BinOp::Add.apply(Value::Bool(true), Value::Int(1), DivisionPolicy::Strict),
      Err(EvalError::Type(_))
    ));
    assert!(matches!(
      BinOp::And.apply(Value::Int(1), Value::Int(1), DivisionPolicy::Strict),
      Err(EvalError::Type(_))
    ));
    assert!(matches!(UnOp::Not.apply(Value::Int(1)), Err(EvalError::Type(_))));
  }
}
