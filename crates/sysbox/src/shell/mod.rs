//! The simulated shell: grammar recognizer plus command interpreter.
//!
//! `parser` maps raw input lines to a closed set of typed command intents;
//! `interp` executes an intent against one workspace's filesystem store and
//! process table, applying the scoring and milestone rules.

mod interp;
mod parser;

pub use interp::{Interpreter, ShellError};
pub use parser::{Command, ParseError, parse};
