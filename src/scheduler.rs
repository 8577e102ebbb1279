/*!
  Minute-based scheduling of interpreter runs.

  Each registered source file declares its execution minute on its first line. The
  scheduler keeps one slot per wall-clock minute; when a minute comes up, every
  interpreter due at it is launched on its own thread and the trigger moves on without
  waiting, so a long or blocked run never delays the next minute. Instances are
  independent — each owns its memory space exclusively — and a new trigger for a file
  whose previous run is still going is skipped, not queued.

  Minutes are minutes of the UTC hour: the trigger derives them from the UNIX epoch,
  without consulting the local timezone.
*/

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, TryLockError};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{error, info, warn};

use crate::error::{Error, Result};
use crate::interpreter::Interpreter;

/// The extension a CAJOlang source file must carry.
pub const SOURCE_EXTENSION: &str = "cl";

const MINUTES_PER_HOUR: usize = 60;

pub struct Scheduler {
  /// One slot per minute of the hour, listing the file names due at that minute.
  schedule: Vec<Vec<String>>,
  interpreters: HashMap<String, Arc<Mutex<Interpreter>>>,
}

impl Scheduler {
  pub fn new() -> Scheduler {
    Scheduler {
      schedule: vec![Vec::new(); MINUTES_PER_HOUR],
      interpreters: HashMap::new(),
    }
  }

  /// Validates a source path and registers an interpreter for it at the minute the
  /// file declares. The path must exist, be a regular file, and end in `.cl`.
  pub fn register(&mut self, path: &str) -> Result<()> {
    let path_ref = Path::new(path);
    if !path_ref.exists() {
      return Err(Error::Io(format!("file {} does not exist", path)));
    }
    if !path_ref.is_file() {
      return Err(Error::Io(format!("{} is not a regular file", path)));
    }
    if path_ref.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
      return Err(Error::Format(
        format!("{} is not a CAJOlang source file (expected .{})", path, SOURCE_EXTENSION)
      ));
    }

    let filename = path_ref
      .file_name()
      .and_then(|name| name.to_str())
      .unwrap_or(path)
      .to_string();
    let interpreter = Interpreter::new(path);
    let minute = interpreter.get_execution_minute()? as usize;

    self.schedule[minute].push(filename.clone());
    self.interpreters.insert(filename, Arc::new(Mutex::new(interpreter)));
    Ok(())
  }

  /// The file names due at the given minute.
  pub fn due_at(&self, minute: usize) -> &[String] {
    &self.schedule[minute % MINUTES_PER_HOUR]
  }

  pub fn registered_count(&self) -> usize {
    self.interpreters.len()
  }

  /// Launches every interpreter due at `minute`, each on its own thread, and returns
  /// without waiting for any of them.
  pub fn dispatch_minute(&self, minute: usize) {
    for filename in self.due_at(minute) {
      match self.interpreters.get(filename) {
        Some(instance) => {
          let instance = Arc::clone(instance);
          let filename = filename.clone();
          thread::spawn(move || {
            Scheduler::run_instance(&filename, &instance);
          });
        }
        None => {} // registration always fills both maps
      }
    }
  }

  fn run_instance(filename: &str, instance: &Arc<Mutex<Interpreter>>) {
    let mut interpreter = match instance.try_lock() {
      Ok(guard) => guard,
      Err(TryLockError::WouldBlock) => {
        warn!("{}: previous run still in progress, skipping this trigger", filename);
        return;
      }
      Err(TryLockError::Poisoned(_)) => {
        error!("{}: a previous run panicked, skipping", filename);
        return;
      }
    };

    info!("{}: run starting", filename);
    match interpreter.run() {
      Ok(())     => info!("{}: run finished", filename),
      Err(cause) => error!("{}: run aborted: {}", filename, cause),
    }
  }

  /// Runs every registered file once, sequentially, logging each outcome. Returns the
  /// number of failed runs.
  pub fn run_all(&self) -> usize {
    let mut failures = 0;
    for (filename, instance) in &self.interpreters {
      info!("{}: run starting", filename);
      let result = match instance.lock() {
        Ok(mut interpreter) => interpreter.run(),
        Err(poisoned)       => poisoned.into_inner().run(),
      };
      match result {
        Ok(())     => info!("{}: run finished", filename),
        Err(cause) => {
          error!("{}: run aborted: {}", filename, cause);
          failures += 1;
        }
      }
    }
    failures
  }

  /// Fires each wall-clock minute exactly once, forever. The minute of the hour is
  /// derived from the UNIX epoch and is therefore UTC; in a timezone with a
  /// non-whole-hour offset it differs from the local minute by that fraction.
  pub fn run_forever(&self) -> ! {
    loop {
      let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
      let minute_of_hour = (since_epoch.as_secs() / 60) as usize % MINUTES_PER_HOUR;
      self.dispatch_minute(minute_of_hour);

      // Sleep to the next minute boundary; at least one second of progress.
      let until_next_minute = 60 - since_epoch.as_secs() % 60;
      thread::sleep(Duration::from_secs(until_next_minute.max(1)));
    }
  }
}

impl Default for Scheduler {
  fn default() -> Scheduler {
    Scheduler::new()
  }
}
