//! An interpreter for CAJOlang, a minimal line-oriented instruction language over a
//! fixed-size memory model, together with the minute-based scheduler that decides when
//! each source file runs. Integers cross file boundaries in a 16-character binary-text
//! two's-complement encoding.

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod codec;
pub mod error;
pub mod instruction;
pub mod interpreter;
pub mod memspace;
pub mod parser;
pub mod scheduler;
pub mod validation;

pub use error::{Error, Result};
pub use interpreter::Interpreter;
pub use scheduler::Scheduler;
