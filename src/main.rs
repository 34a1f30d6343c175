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

use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::eval::control::ControlTable;
use crate::eval::standardize;
use crate::eval::DivisionPolicy;
use crate::eval::Options;
use crate::exec::fs::FileSys;
use crate::exec::fs::Local;
use crate::exec::parallel::Executor;

pub mod eval;
pub mod exec;
pub mod syn;

#[derive(Parser)]
#[command(name = "rpal", version, about = "An evaluator for RPAL programs")]
struct Cli {
  /// Print the parsed tree instead of running
  #[arg(long)]
  ast: bool,
  /// Print the standardized tree instead of running
  #[arg(long)]
  st: bool,
  /// Print the control structures instead of running
  #[arg(long)]
  cs: bool,
  /// Treat division by zero as 0, with a warning, instead of an error
  #[arg(long)]
  lenient_division: bool,
  /// Number of files to evaluate at once
  #[arg(short, long, default_value_t = 8)]
  jobs: usize,
  /// Programs to run; starts a REPL when empty
  files: Vec<PathBuf>,
}

fn main() {
  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn")),
    )
    .init();

  let cli = Cli::parse();
  let opts = Options {
    division: if cli.lenient_division {
      DivisionPolicy::Lenient
    } else {
      DivisionPolicy::Strict
    },
    ..Options::default()
  };

  if cli.files.is_empty() {
    if let Err(e) = exec::repl::Executor::new(opts).execute_loop() {
      eprintln!("error: {}", e);
      process::exit(1)
    }
    return;
  }

  let fs = match Local::new() {
    Ok(fs) => fs,
    Err(e) => {
      eprintln!("error: cannot read current working directory: {}", e);
      process::exit(1)
    }
  };

  if cli.ast || cli.st || cli.cs {
    let mut errors = 0;
    for file in &cli.files {
      if let Err(e) = dump(&fs, file, &cli, &opts) {
        eprintln!("{}: {}", file.display(), e);
        errors += 1;
      }
    }
    if errors > 0 {
      process::exit(1)
    }
    return;
  }

  let exec = Executor::new(&fs, opts);
  let outcomes =
    exec.exec_files(cli.files.iter().map(PathBuf::as_path), cli.jobs);
  let headers = outcomes.len() > 1;
  for (file, outcome) in outcomes {
    if headers {
      println!("# {}", file.display());
    }
    match outcome {
      Ok(out) => {
        print!("{}", out.printed);
        if !out.printed.is_empty() && !out.printed.ends_with('\n') {
          println!();
        }
      }
      Err(e) => eprintln!("{}", e),
    }
  }

  let errors = exec.errors();
  if errors > 0 {
    eprintln!("error: got {} errors", errors);
    process::exit(1)
  }
}

/// Prints the diagnostic views of `file` that `cli` asks for.
fn dump(
  fs: &Local,
  file: &Path,
  cli: &Cli,
  opts: &Options,
) -> Result<(), Box<dyn std::error::Error>> {
  let text = fs.read_file(file)?;
  let mut tree = syn::parse(&text)?;
  if cli.ast {
    print!("{}", tree);
  }
  if cli.st || cli.cs {
    standardize::standardize(&mut tree, opts.max_passes);
  }
  if cli.st {
    print!("{}", tree);
  }
  if cli.cs {
    print!("{}", ControlTable::build(&tree)?);
  }
  Ok(())
}
