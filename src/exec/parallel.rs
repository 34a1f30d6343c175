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

//! Execution environment for evaluating many RPAL files at once.
//!
//! Each file runs in its own single-threaded pipeline; only the finished
//! output crosses threads.

use std::path::Path;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;

use chashmap::CHashMap;

use crate::eval;
use crate::eval::Options;
use crate::eval::Output;
use crate::exec::fs::FileSys;

/// The result of evaluating one file: its output, or an error message.
pub type Outcome = Result<Output, String>;

/// A parallel executor, which can execute a large set of RPAL files
/// simultaneously.
pub struct Executor<'a, Fs> {
  evaluated_files: CHashMap<&'a Path, EvalState>,
  fs: &'a Fs,
  opts: Options,
  errors: AtomicUsize,
}

enum EvalState {
  Complete(Outcome),
  Waiting(Vec<mpsc::SyncSender<Outcome>>),
}

impl<'a, Fs> Executor<'a, Fs>
where
  Fs: FileSys,
{
  /// Constructs a new `Executor`, using the given file system and options.
  pub fn new(fs: &'a Fs, opts: Options) -> Self {
    Executor {
      evaluated_files: CHashMap::new(),
      fs,
      opts,
      errors: AtomicUsize::new(0),
    }
  }

  /// Returns the number of files that failed so far.
  pub fn errors(&self) -> usize {
    self.errors.load(Ordering::SeqCst)
  }

  /// Executes the given set of files with the given level of parallelism.
  ///
  /// Outcomes are returned in the order the files were given; a file named
  /// twice is evaluated once.
  pub fn exec_files(
    &self,
    file_names: impl IntoIterator<Item = &'a Path>,
    parallelism: usize,
  ) -> Vec<(&'a Path, Outcome)> {
    let file_names = file_names.into_iter().collect::<Vec<_>>();
    let next_work_item = AtomicUsize::new(0);
    let scope = crossbeam::scope(|s| {
      for i in 0..parallelism.max(1) {
        let spawned = s
          .builder()
          .name(format!("rpal-evaluator-{}", i))
          .stack_size(1024 * 1024 * 8) // 8 MB.
          .spawn(|_| loop {
            let idx = next_work_item.fetch_add(1, Ordering::SeqCst);
            if idx >= file_names.len() {
              return;
            }
            if let Err(chan) = self.lookup_or_exec(file_names[idx]) {
              let _ = chan.recv();
            }
          });
        if let Err(e) = spawned {
          tracing::error!(%e, "cannot spawn evaluator thread");
        }
      }
    });
    if scope.is_err() {
      tracing::error!("an evaluator thread panicked");
    }

    file_names
      .iter()
      .map(|&file_name| {
        let outcome = match self.evaluated_files.get(file_name).as_deref() {
          Some(EvalState::Complete(outcome)) => outcome.clone(),
          _ => {
            Err(format!("{}: evaluation did not finish", file_name.display()))
          }
        };
        (file_name, outcome)
      })
      .collect()
  }

  /// Attempts to look up `file_name`'s computed result, or, if unavailable, it
  /// computes it itself.
  fn lookup_or_exec(
    &self,
    file_name: &'a Path,
  ) -> Result<Outcome, mpsc::Receiver<Outcome>> {
    let mut ret = None;
    self.evaluated_files.upsert(
      file_name,
      || EvalState::Waiting(Vec::new()),
      |v| match v {
        EvalState::Complete(v) => ret = Some(Ok(v.clone())),
        EvalState::Waiting(chans) => {
          let (tx, rx) = mpsc::sync_channel(1);
          chans.push(tx);
          ret = Some(Err(rx));
        }
      },
    );

    if let Some(ret) = ret {
      return ret;
    }

    let result = self.exec(file_name);
    self.evaluated_files.alter(file_name, |v| match v {
      Some(EvalState::Waiting(chans)) => {
        for chan in chans {
          let _ = chan.send(result.clone());
        }
        Some(EvalState::Complete(result.clone()))
      }
      Some(v) => Some(v),
      None => None,
    });

    Ok(result)
  }

  /// Actually executes some RPAL.
  fn exec(&self, file_name: &'a Path) -> Outcome {
    tracing::info!(file = %file_name.display(), "queueing");

    let text = match self.fs.read_file(file_name) {
      Ok(s) => s,
      Err(e) => {
        self.errors.fetch_add(1, Ordering::SeqCst);
        return Err(format!(
          "error: cannot read file {}: {}",
          file_name.display(),
          e
        ));
      }
    };

    match eval::run_str(&text, &self.opts) {
      Ok(output) => {
        tracing::info!(file = %file_name.display(), "finished");
        Ok(output)
      }
      Err(e) => {
        self.errors.fetch_add(1, Ordering::SeqCst);
        tracing::info!(file = %file_name.display(), "failed");
        Err(format!("{}: {}", file_name.display(), e))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use pretty_assertions::assert_eq;

  use crate::exec::fs::Memory;

  #[test]
  fn outcomes_keep_argument_order() {
    let mut fs = Memory::new();
    fs.insert("a.rpal", "Print 'a'");
    fs.insert(
      "b.rpal",
      "let rec f n = n eq 0 -> 0 | f (n - 1) in Print (f 500)",
    );
    fs.insert("c.rpal", "Print (1 / 0)");

    let names: Vec<&Path> = vec![
      "c.rpal".as_ref(),
      "a.rpal".as_ref(),
      "missing.rpal".as_ref(),
      "b.rpal".as_ref(),
      "a.rpal".as_ref(),
    ];
    let exec = Executor::new(&fs, Options::default());
    let outcomes = exec.exec_files(names.iter().copied(), 3);

    let printed = outcomes
      .iter()
      .map(|(name, outcome)| match outcome {
        Ok(out) => format!("{}: {}", name.display(), out.printed),
        Err(_) => format!("{}: error", name.display()),
      })
      .collect::<Vec<_>>();
    assert_eq!(
      printed,
      vec![
        "c.rpal: error",
        "a.rpal: a",
        "missing.rpal: error",
        "b.rpal: 0",
        "a.rpal: a",
      ]
    );
    assert_eq!(exec.errors(), 2);
  }
}
