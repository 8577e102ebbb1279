//! Command line entry point: register the given CAJOlang source files and either run
//! them all once or keep dispatching them at their declared minutes.

use std::io::{self, BufRead};
use std::process;

use clap::Parser;
use log::{error, info};

use cajolang::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "cajolang")]
#[command(about = "Interpreter and minute-based scheduler for CAJOlang source files", long_about = None)]
struct Args {
  /// Source files to register; read one path per line from standard input when empty
  files: Vec<String>,

  /// Run every file once immediately instead of scheduling by minute
  #[arg(long)]
  now: bool,
}

fn main() {
  env_logger::init();
  let args = Args::parse();

  let paths = match args.files.is_empty() {
    false => args.files,
    true  => {
      io::stdin()
        .lock()
        .lines()
        .filter_map(|line| line.ok())
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
    }
  };

  let mut scheduler = Scheduler::new();
  for path in &paths {
    if let Err(cause) = scheduler.register(path) {
      error!("{}: {}", path, cause);
      process::exit(1);
    }
  }
  info!("registered {} source file(s)", scheduler.registered_count());

  match args.now {
    true => {
      let failures = scheduler.run_all();
      process::exit(if failures == 0 { 0 } else { 1 });
    }
    false => scheduler.run_forever(),
  }
}
