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

//! The nuts and bolts of the RPAL parser.

#![allow(clippy::upper_case_acronyms)]

use pest::error::ErrorVariant;
use pest::error::LineColLocation;
use pest::iterators::Pair;

use pest_derive::Parser;

use crate::syn::Node;
use crate::syn::Tag;

/// A `ParseError` represents a parse failure at some line and column.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("error: {line}:{col}: {message}")]
pub struct ParseError {
  /// The one-indexed line at which the error occured.
  pub line: usize,
  /// The one-indexed column at which the error occured.
  pub col: usize,
  /// An error message.
  pub message: String,
}

/// Parse `input` into a syntax tree, returning an error on failure.
pub fn parse(input: &str) -> Result<Node, ParseError> {
  use pest::Parser as _;

  let mut pairs = match PegParser::parse(Rule::Program, input) {
    Ok(pairs) => pairs,
    Err(err) => {
      let (line, col) = match err.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
      };

      let message = match err.variant {
        ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
          let expected =
            positives.iter().map(|r| format!("{:?}", r)).collect::<Vec<_>>();
          format!("expected one of: {}", expected.join(", "))
        }
        ErrorVariant::CustomError { message } => message,
        _ => "unexpected input".to_string(),
      };

      return Err(ParseError {
        line,
        col,
        message,
      });
    }
  };

  // `Program` always wraps exactly one `Expr`, then `EOI`.
  let program = pairs.next().unwrap();
  let expr = program.into_inner().next().unwrap();
  parse_expr(expr)
}

#[derive(Parser)]
#[grammar = "syn/rpal.pest"]
struct PegParser;

fn is_separator(rule: Rule) -> bool {
  matches!(
    rule,
    Rule::Let
      | Rule::In
      | Rule::Fn
      | Rule::Where
      | Rule::Aug
      | Rule::Or
      | Rule::Within
      | Rule::And
  )
}

/// Returns the significant sub-pairs of `pair`, dropping keyword tokens whose
/// only purpose is to separate operands.
fn inner(pair: Pair<'_, Rule>) -> impl Iterator<Item = Pair<'_, Rule>> {
  pair.into_inner().filter(|p| !is_separator(p.as_rule()))
}

/// Folds a left-associative chain `a op b op c` into `op(op(a, b), c)`.
fn fold_left(
  pair: Pair<'_, Rule>,
  tag: Tag,
  value: &str,
) -> Result<Node, ParseError> {
  let mut pairs = inner(pair);
  let mut expr = parse_expr(pairs.next().unwrap())?;
  for rhs in pairs {
    let rhs = parse_expr(rhs)?;
    expr = Node::branch(tag, value, vec![expr, rhs]);
  }
  Ok(expr)
}

fn parse_expr(pair: Pair<'_, Rule>) -> Result<Node, ParseError> {
  let node = match pair.as_rule() {
    Rule::Ident => Node::ident(pair.as_str()),
    Rule::Int => match pair.as_str().parse::<i64>() {
      Ok(n) => Node::int(n),
      Err(_) => {
        let (line, col) = pair.as_span().start_pos().line_col();
        return Err(ParseError {
          line,
          col,
          message: format!("integer literal {} is too large", pair.as_str()),
        });
      }
    },
    Rule::Str => {
      let text = pair.into_inner().next().unwrap();
      Node::string(text.as_str())
    }
    Rule::True => Node::keyword("true", vec![]),
    Rule::False => Node::keyword("false", vec![]),
    Rule::Nil => Node::keyword("nil", vec![]),
    Rule::Dummy => Node::keyword("dummy", vec![]),

    Rule::LetExpr => {
      let mut pairs = inner(pair);
      let def = parse_def(pairs.next().unwrap())?;
      let body = parse_expr(pairs.next().unwrap())?;
      Node::keyword("let", vec![def, body])
    }
    Rule::FnExpr => {
      let mut children = Vec::new();
      for pair in inner(pair) {
        match pair.as_rule() {
          Rule::Expr => children.push(parse_expr(pair)?),
          _ => children.push(parse_binder(pair)),
        }
      }
      Node::keyword("lambda", children)
    }
    Rule::WhereExpr => {
      let mut pairs = inner(pair);
      let expr = parse_expr(pairs.next().unwrap())?;
      match pairs.next() {
        Some(def) => Node::keyword("where", vec![expr, parse_def(def)?]),
        None => expr,
      }
    }
    Rule::TupleExpr => {
      let mut elements =
        inner(pair).map(parse_expr).collect::<Result<Vec<_>, _>>()?;
      if elements.len() == 1 {
        elements.pop().unwrap()
      } else {
        Node::keyword("tau", elements)
      }
    }
    Rule::AugExpr => fold_left(pair, Tag::Keyword, "aug")?,
    Rule::CondExpr => {
      let mut branches =
        inner(pair).map(parse_expr).collect::<Result<Vec<_>, _>>()?;
      if branches.len() == 1 {
        branches.pop().unwrap()
      } else {
        Node::keyword("->", branches)
      }
    }
    Rule::OrExpr => fold_left(pair, Tag::Operator, "or")?,
    Rule::AndExpr => fold_left(pair, Tag::Operator, "&")?,
    Rule::NotExpr => {
      let mut pairs = inner(pair).peekable();
      let negated = pairs.peek().map(|p| p.as_rule()) == Some(Rule::Not);
      if negated {
        let _not = pairs.next();
      }
      let expr = parse_expr(pairs.next().unwrap())?;
      if negated {
        Node::branch(Tag::Operator, "not", vec![expr])
      } else {
        expr
      }
    }
    Rule::RelExpr => {
      let mut pairs = inner(pair);
      let lhs = parse_expr(pairs.next().unwrap())?;
      match pairs.next() {
        Some(op) => {
          let op = match op.as_rule() {
            Rule::Gr => "gr",
            Rule::Ge => "ge",
            Rule::Ls => "ls",
            Rule::Le => "le",
            Rule::Eq => "eq",
            Rule::Ne => "ne",
            r => panic!("unexpected rule: {:?}", r),
          };
          let rhs = parse_expr(pairs.next().unwrap())?;
          Node::branch(Tag::Operator, op, vec![lhs, rhs])
        }
        None => lhs,
      }
    }
    Rule::SumExpr => {
      let mut pairs = inner(pair).peekable();
      let sign = match pairs.peek().map(|p| p.as_rule()) {
        Some(Rule::Plus) | Some(Rule::Minus) => pairs.next(),
        _ => None,
      };
      let mut expr = parse_expr(pairs.next().unwrap())?;
      if let Some(Rule::Minus) = sign.map(|p| p.as_rule()) {
        expr = Node::branch(Tag::Operator, "neg", vec![expr]);
      }
      while let Some(op) = pairs.next() {
        let op = match op.as_rule() {
          Rule::Plus => "+",
          Rule::Minus => "-",
          r => panic!("unexpected rule: {:?}", r),
        };
        let rhs = parse_expr(pairs.next().unwrap())?;
        expr = Node::branch(Tag::Operator, op, vec![expr, rhs]);
      }
      expr
    }
    Rule::ProdExpr => {
      let mut pairs = inner(pair);
      let mut expr = parse_expr(pairs.next().unwrap())?;
      while let Some(op) = pairs.next() {
        let op = match op.as_rule() {
          Rule::Star => "*",
          Rule::Slash => "/",
          r => panic!("unexpected rule: {:?}", r),
        };
        let rhs = parse_expr(pairs.next().unwrap())?;
        expr = Node::branch(Tag::Operator, op, vec![expr, rhs]);
      }
      expr
    }
    Rule::PowExpr => {
      let mut pairs = inner(pair);
      let base = parse_expr(pairs.next().unwrap())?;
      match pairs.next() {
        Some(exp) => {
          Node::branch(Tag::Operator, "**", vec![base, parse_expr(exp)?])
        }
        None => base,
      }
    }
    Rule::AtExpr => {
      let mut pairs = inner(pair);
      let mut expr = parse_expr(pairs.next().unwrap())?;
      while let Some(name) = pairs.next() {
        let name = Node::ident(name.as_str());
        let rhs = parse_expr(pairs.next().unwrap())?;
        expr = Node::keyword("@", vec![expr, name, rhs]);
      }
      expr
    }
    Rule::AppExpr => fold_left(pair, Tag::Keyword, "gamma")?,
    Rule::Parens | Rule::Expr => parse_expr(pair.into_inner().next().unwrap())?,
    r => panic!("unexpected rule: {:?}", r),
  };
  Ok(node)
}

fn parse_def(pair: Pair<'_, Rule>) -> Result<Node, ParseError> {
  let node = match pair.as_rule() {
    Rule::Def => {
      let mut pairs = inner(pair);
      let def = parse_def(pairs.next().unwrap())?;
      match pairs.next() {
        Some(scope) => Node::keyword("within", vec![def, parse_def(scope)?]),
        None => def,
      }
    }
    Rule::AndDef => {
      let mut defs =
        inner(pair).map(parse_def).collect::<Result<Vec<_>, _>>()?;
      if defs.len() == 1 {
        defs.pop().unwrap()
      } else {
        Node::keyword("and", defs)
      }
    }
    Rule::RecDef => {
      let mut pairs = inner(pair).peekable();
      let is_rec = pairs.peek().map(|p| p.as_rule()) == Some(Rule::Rec);
      if is_rec {
        let _rec = pairs.next();
      }
      let def = parse_def(pairs.next().unwrap())?;
      if is_rec {
        Node::keyword("rec", vec![def])
      } else {
        def
      }
    }
    Rule::FcnForm => {
      let mut pairs = inner(pair);
      let name = Node::ident(pairs.next().unwrap().as_str());
      let mut children = vec![name];
      for pair in pairs {
        match pair.as_rule() {
          Rule::Expr => children.push(parse_expr(pair)?),
          _ => children.push(parse_binder(pair)),
        }
      }
      Node::keyword("fcn_form", children)
    }
    Rule::Binding => {
      let mut pairs = inner(pair);
      let vars = parse_binder(pairs.next().unwrap());
      let value = parse_expr(pairs.next().unwrap())?;
      Node::keyword("=", vec![vars, value])
    }
    r => panic!("unexpected rule: {:?}", r),
  };
  Ok(node)
}

fn parse_binder(pair: Pair<'_, Rule>) -> Node {
  match pair.as_rule() {
    Rule::Ident => Node::ident(pair.as_str()),
    Rule::EmptyParens => Node::new(Tag::Punct, "()"),
    Rule::VarList => {
      let mut names =
        pair.into_inner().map(|p| Node::ident(p.as_str())).collect::<Vec<_>>();
      if names.len() == 1 {
        names.pop().unwrap()
      } else {
        Node::branch(Tag::Punct, ",", names)
      }
    }
    r => panic!("unexpected rule: {:?}", r),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use pretty_assertions::assert_eq;

  fn dump(src: &str) -> String {
    match parse(src) {
      Ok(tree) => tree.dump(),
      Err(e) => panic!("failed to parse {:?}: {}", src, e),
    }
  }

  #[test]
  fn let_binding() {
    assert_eq!(
      dump("let x = 3 in Print(x + 4)"),
      "\
let
.=
..<ID:x>
..<INT:3>
.gamma
..<ID:Print>
..+
...<ID:x>
...<INT:4>
"
    );
  }

  #[test]
  fn function_form_with_tuple_binder() {
    assert_eq!(
      dump("let f x (a, b) = x in f"),
      "\
let
.fcn_form
..<ID:f>
..<ID:x>
..,
...<ID:a>
...<ID:b>
..<ID:x>
.<ID:f>
"
    );
  }

  #[test]
  fn conditional_and_relational_aliases() {
    assert_eq!(
      dump("n > 0 -> 'pos' | n <= 0 & not true"),
      "\
->
.gr
..<ID:n>
..<INT:0>
.<STR:'pos'>
.&
..le
...<ID:n>
...<INT:0>
..not
...<true>
"
    );
  }

  #[test]
  fn arithmetic_precedence_and_associativity() {
    assert_eq!(
      dump("-a - b * c ** d ** e"),
      "\
-
.neg
..<ID:a>
.*
..<ID:b>
..**
...<ID:c>
...**
....<ID:d>
....<ID:e>
"
    );
  }

  #[test]
  fn application_is_left_associative() {
    assert_eq!(
      dump("f x y"),
      "gamma\n.gamma\n..<ID:f>\n..<ID:x>\n.<ID:y>\n"
    );
  }

  #[test]
  fn definitions() {
    assert_eq!(
      dump("x where rec f n = n"),
      "\
where
.<ID:x>
.rec
..fcn_form
...<ID:f>
...<ID:n>
...<ID:n>
"
    );
    assert_eq!(
      dump("let a = 1 within b = a and c, d = 2, nil in dummy"),
      "\
let
.within
..=
...<ID:a>
...<INT:1>
..and
...=
....<ID:b>
....<ID:a>
...=
....,
.....<ID:c>
.....<ID:d>
....tau
.....<INT:2>
.....<nil>
.<dummy>
"
    );
  }

  #[test]
  fn infix_application_and_aug() {
    assert_eq!(
      dump("nil aug 1 aug a @f b // trailing comment"),
      "\
aug
.aug
..<nil>
..<INT:1>
.@
..<ID:a>
..<ID:f>
..<ID:b>
"
    );
  }

  #[test]
  fn lambda_with_several_binders() {
    assert_eq!(
      dump("fn x () . 'a\\'b'"),
      "lambda\n.<ID:x>\n.()\n.<STR:'a\\'b'>\n"
    );
  }

  #[test]
  fn keywords_are_not_identifiers() {
    assert!(parse("let in = 3 in in").is_err());
    assert_eq!(dump("index"), "<ID:index>\n");
  }

  #[test]
  fn errors_report_position() {
    let err = parse("let x = in 3").unwrap_err();
    assert_eq!(err.line, 1);
    assert!(err.col >= 9, "{}", err);
  }
}
