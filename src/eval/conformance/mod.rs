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

//! Conformance tests for the interpreter.
//!
//! A conformance test consists of an RPAL file, `name.rpal`, and the output it
//! is expected to print, `name.out`. The file is parsed and run, and whatever
//! it prints is compared against the expectation, ignoring trailing
//! whitespace.
//!
//! A test declared with `fails` must instead stop with an error whose message
//! contains the expectation.

use pretty_assertions::assert_eq;

use crate::eval;
use crate::eval::Options;

/// Macro for generating conformance tests.
macro_rules! conf_test {
  ($test_name:ident) => {
    #[test]
    fn $test_name() {
      conformance_test(
        concat!(stringify!($test_name), ".rpal"),
        include_str!(concat!(stringify!($test_name), ".rpal")),
        include_str!(concat!(stringify!($test_name), ".out")),
      )
    }
  };
  ($test_name:ident, fails) => {
    #[test]
    fn $test_name() {
      failure_test(
        concat!(stringify!($test_name), ".rpal"),
        include_str!(concat!(stringify!($test_name), ".rpal")),
        include_str!(concat!(stringify!($test_name), ".out")),
      )
    }
  };
}

/// Basic fixture for all conformance tests.
fn conformance_test(name: &'static str, text: &'static str, expected: &str) {
  match eval::run_str(text, &Options::default()) {
    Ok(out) => assert_eq!(out.printed.trim_end(), expected.trim_end()),
    Err(e) => {
      eprintln!("{}: {}", name, e);
      panic!("unexpected failure")
    }
  }
}

/// Fixture for tests of programs that must not run to completion.
fn failure_test(name: &'static str, text: &'static str, expected: &str) {
  match eval::run_str(text, &Options::default()) {
    Ok(out) => {
      eprintln!("{}: printed {:?}", name, out.printed);
      panic!("body failed to die")
    }
    Err(e) => {
      let message = e.to_string();
      let expected = expected.trim_end();
      assert!(
        message.contains(expected),
        "{}: expected an error containing {:?}, got {:?}",
        name,
        expected,
        message
      );
    }
  }
}

conf_test!(let_scenario);
conf_test!(definitions);
conf_test!(functions);
conf_test!(recursion);
conf_test!(conditionals);

conf_test!(integers);
conf_test!(strings);
conf_test!(tuples);
conf_test!(predicates);
conf_test!(printing);

conf_test!(unbound, fails);
conf_test!(type_mismatch, fails);
conf_test!(bad_index, fails);
conf_test!(divide_by_zero, fails);
conf_test!(binder_arity, fails);
