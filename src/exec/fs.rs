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

//! Virtual file systems for executor file lookups.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

/// A virtual file system, allowing for access to files for execution.
///
/// For example, this could be a collection of in-memory files, or it could
/// be a thin wrapper around the local file system (or a subset of it).
pub trait FileSys: Send + Sync {
  /// Looks up the file with the given name.
  fn read_file(&self, file_name: &Path) -> io::Result<Arc<str>>;
}

/// The local file system.
///
/// A `Local` can specify a custom "working directory" (relative to which
/// relative paths are resolved) and a "required prefix", such that
/// canonicalized paths cannot escape a certain subset of the local file system.
///
/// Files are read at most once; later reads share the first read's text.
pub struct Local {
  files: Mutex<HashMap<PathBuf, Arc<str>>>,
  cwd: PathBuf,
  prefix: Option<PathBuf>,
}

impl Local {
  /// Creates a new `Local` with the current process's working directory as the
  /// working directory, and no prefix.
  pub fn new() -> io::Result<Self> {
    Ok(Self::with_options(env::current_dir()?, None))
  }

  /// Creates a new `Local` with the given working directory and prefix.
  pub fn with_options(cwd: PathBuf, prefix: Option<PathBuf>) -> Self {
    Self {
      files: Mutex::new(HashMap::new()),
      cwd,
      prefix,
    }
  }

  fn resolve(&self, file_name: &Path) -> io::Result<PathBuf> {
    let mut full_path = self.cwd.clone();
    full_path.push(file_name);
    if let Some(prefix) = &self.prefix {
      full_path = fs::canonicalize(&full_path)?;
      if !full_path.starts_with(prefix) {
        return Err(io::Error::new(
          io::ErrorKind::PermissionDenied,
          "attempted to escape local filesystem prefix",
        ));
      }
    }
    Ok(full_path)
  }
}

impl FileSys for Local {
  fn read_file(&self, file_name: &Path) -> io::Result<Arc<str>> {
    // A poisoned lock only means another reader panicked; the cache itself is
    // still consistent.
    let mut files = match self.files.lock() {
      Ok(files) => files,
      Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(text) = files.get(file_name) {
      return Ok(Arc::clone(text));
    }

    let text: Arc<str> = fs::read_to_string(self.resolve(file_name)?)?.into();
    files.insert(file_name.to_path_buf(), Arc::clone(&text));
    Ok(text)
  }
}

/// An in-memory file system.
#[derive(Default)]
pub struct Memory {
  files: HashMap<PathBuf, Arc<str>>,
}

impl Memory {
  /// Creates an empty `Memory`.
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a file, replacing any file already at `file_name`.
  pub fn insert(&mut self, file_name: impl Into<PathBuf>, text: &str) {
    self.files.insert(file_name.into(), text.into());
  }
}

impl FileSys for Memory {
  fn read_file(&self, file_name: &Path) -> io::Result<Arc<str>> {
    match self.files.get(file_name) {
      Some(text) => Ok(Arc::clone(text)),
      None => Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", file_name.display()),
      )),
    }
  }
}
