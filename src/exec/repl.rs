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

//! Execution environment for the RPAL Read-Eval-Print Loop.

use std::io;
use std::time::Duration;
use std::time::Instant;

use rustyline::error::ReadlineError;
use rustyline::Editor;

use crate::eval;
use crate::eval::standardize;
use crate::eval::Options;
use crate::syn;

const DOUBLE_CTRL_C_THRESHOLD: Duration = Duration::from_millis(300);

/// All state for the REPL.
pub struct Executor {
  opts: Options,
  editor: Editor<()>,
  last_ctrl_c: Instant,
  show_ast: bool,
  show_st: bool,
}

impl Executor {
  /// Creates a new REPL; call `execute_loop()` to run it.
  pub fn new(opts: Options) -> Self {
    Executor {
      opts,
      editor: Editor::new(),
      last_ctrl_c: Instant::now(),
      show_ast: false,
      show_st: false,
    }
  }

  /// Runs the REPL until the user quits.
  pub fn execute_loop(&mut self) -> io::Result<()> {
    eprintln!(
      "Welcome to RPAL v{version} (rustc v{rustc}, {arch} {os})",
      version = env!("CARGO_PKG_VERSION"),
      os = std::env::consts::OS,
      arch = std::env::consts::ARCH,
      rustc = rustc_version::version().unwrap_or((0, 0, 0).into()),
    );
    eprintln!("Enter programs below and have them evaluated.");
    eprintln!("Run :quit, or double-press ^C, to escape.");
    eprintln!("Run :help for more information.");
    eprintln!();
    loop {
      let buf = match self.read_line()? {
        Some(buf) => buf,
        None => return Ok(()),
      };
      if buf.trim().is_empty() {
        continue;
      }

      if buf.starts_with(':') {
        if !self.execute_command(&buf) {
          return Ok(());
        }
        continue;
      }

      self.evaluate(&buf);
    }
  }

  fn evaluate(&self, text: &str) {
    let mut tree = match syn::parse(text) {
      Ok(tree) => tree,
      Err(e) => {
        eprintln!("{}", e);
        return;
      }
    };
    if self.show_ast {
      print!("{}", tree);
    }
    if self.show_st {
      standardize::standardize(&mut tree, self.opts.max_passes);
      print!("{}", tree);
    }

    let table = match eval::compile(tree, &self.opts) {
      Ok(table) => table,
      Err(e) => {
        eprintln!("error: {}", e);
        return;
      }
    };
    let mut printed = Vec::new();
    let result = eval::run(&table, &self.opts, &mut printed);
    if !printed.is_empty() {
      println!("{}", String::from_utf8_lossy(&printed));
    }
    match result {
      Ok(eval::value::Value::Dummy) => {}
      Ok(value) => println!("= {}", value),
      Err(e) => eprintln!("error: {}", e),
    }
  }

  /// Reads one entry, which may span several lines. Returns `None` at the end
  /// of input.
  fn read_line(&mut self) -> io::Result<Option<String>> {
    let mut buf = String::new();
    let mut indent = 0;
    loop {
      let prompt = if buf.is_empty() { "rpal> " } else { "   | " };
      let indent_whitespace = "  ".repeat(indent);
      match self
        .editor
        .readline_with_initial(prompt, (&indent_whitespace, ""))
      {
        Ok(s) => {
          buf.push_str(s.as_str());
          buf.push('\n');
        }
        Err(ReadlineError::Io(e)) => return Err(e),
        Err(ReadlineError::Eof) => return Ok(None),
        Err(ReadlineError::Interrupted) => {
          if self.last_ctrl_c.elapsed() < DOUBLE_CTRL_C_THRESHOLD {
            return Ok(None);
          }
          self.last_ctrl_c = Instant::now();

          return Ok(Some(String::new()));
        }
        Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
      }

      let (matches, i) = check_brackets_match(&buf);
      if matches || i < 0 {
        buf.pop();
        self.editor.add_history_entry(buf.as_str());
        return Ok(Some(buf));
      }
      indent = i as usize;
    }
  }

  /// Runs a `:` command; returns false if the REPL should exit.
  fn execute_command(&mut self, command: &str) -> bool {
    let args = command.split_ascii_whitespace().collect::<Vec<_>>();
    match args.first().copied().unwrap_or(":") {
      ":help" | ":h" => println!(
        "\
available commands:
:ast   - toggle printing the parsed tree
:clear - clears the terminal
:help  - shows this message
:quit  - exits the REPL
:st    - toggle printing the standardized tree\
"
      ),
      ":ast" | ":a" => {
        self.show_ast = !self.show_ast;
        eprintln!("ast: {}", if self.show_ast { "on" } else { "off" });
      }
      ":st" | ":s" => {
        self.show_st = !self.show_st;
        eprintln!("st: {}", if self.show_st { "on" } else { "off" });
      }
      ":clear" | ":c" => {
        print!("{}{}", termion::clear::All, termion::cursor::Goto(1, 1))
      }
      ":quit" | ":q" => return false,
      command => eprintln!("unknown command: {}", command),
    }
    true
  }
}

/// Returns true if `s` has balanced parentheses and strings;
/// it also returns the expected indentation level.
fn check_brackets_match(s: &str) -> (bool, i32) {
  let mut bracket_count: i32 = 0;

  let mut chars = s.chars().peekable();
  'char_loop: while let Some(c) = chars.next() {
    match (c, chars.peek()) {
      ('/', Some('/')) => loop {
        match chars.next() {
          Some('\n') | None => continue 'char_loop,
          _ => {}
        }
      },

      ('(', _) => bracket_count += 1,
      (')', _) => bracket_count -= 1,

      ('\'', _) => loop {
        match chars.next() {
          Some('\\') => {
            let _ = chars.next();
          }
          Some('\'') => continue 'char_loop,
          None => return (false, 0),
          _ => {}
        }
      },
      _ => {}
    }
  }

  (bracket_count == 0, bracket_count)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn brackets() {
    assert_eq!(check_brackets_match("Print (1, 2)"), (true, 0));
    assert_eq!(check_brackets_match("Print ((1,\n"), (false, 2));
    assert_eq!(check_brackets_match("Print ')'"), (true, 0));
    assert_eq!(check_brackets_match("Print 'it\\'s"), (false, 0));
    assert_eq!(check_brackets_match("1 // (\n"), (true, 0));
    assert_eq!(check_brackets_match("1)"), (false, -1));
  }
}
