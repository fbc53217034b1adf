//! Command grammar recognizer.
//!
//! The shell accepts a fixed, closed command set. Parsing is an ordered list
//! of typed matchers over the whitespace-split token stream; command
//! keywords and flags are matched exactly and case-sensitively, and the
//! whole line must be consumed. Anything outside the grammar is
//! [`ParseError::InvalidCommand`], which by contract mutates nothing.

use thiserror::Error;

/// Parse failure. Carries the offending input for error display.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The line does not match any command in the grammar.
    #[error("command not allowed or invalid syntax: {0}")]
    InvalidCommand(String),
}

/// A parsed command intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `ls [-a] [path]`
    Ls {
        /// Include hidden entries.
        all: bool,
        /// Optional target; defaults to the cwd.
        path: Option<String>,
    },
    /// `pwd`
    Pwd,
    /// `cd <path>`
    Cd {
        /// Target directory.
        path: String,
    },
    /// `cat <path>`
    Cat {
        /// Target file.
        path: String,
    },
    /// `diff <a> <b>`
    Diff {
        /// Left file.
        left: String,
        /// Right file.
        right: String,
    },
    /// `tar -xvzf <archive>`
    TarExtract {
        /// Archive file carrying an embedded manifest.
        archive: String,
    },
    /// `cp <src> <dst>`
    Cp {
        /// Source path.
        src: String,
        /// Destination path.
        dst: String,
    },
    /// `chmod +x <path>`
    Chmod {
        /// Target path.
        path: String,
    },
    /// `./<script>`
    Run {
        /// Script name as typed, without the `./` prefix.
        script: String,
    },
    /// `ps [-ef] [--forest]`
    Ps {
        /// Hierarchical tree view.
        forest: bool,
    },
    /// `lsof -p <pid>`
    Lsof {
        /// Target pid.
        pid: u32,
    },
    /// `kill -9 <pid>`
    Kill {
        /// Target pid.
        pid: u32,
    },
    /// `rm <path>`
    Rm {
        /// Target path.
        path: String,
    },
}

/// Parse one trimmed input line into a [`Command`].
pub fn parse(raw: &str) -> Result<Command, ParseError> {
    let line = raw.trim();
    let invalid = || ParseError::InvalidCommand(line.to_string());

    // `./script` has no keyword token; handle it before tokenizing.
    if let Some(script) = line.strip_prefix("./") {
        if script.is_empty() || script.contains(char::is_whitespace) {
            return Err(invalid());
        }
        return Ok(Command::Run {
            script: script.to_string(),
        });
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["ls"] => Ok(Command::Ls {
            all: false,
            path: None,
        }),
        ["ls", "-a"] => Ok(Command::Ls {
            all: true,
            path: None,
        }),
        ["ls", "-a", path] if !path.starts_with('-') => Ok(Command::Ls {
            all: true,
            path: Some((*path).to_string()),
        }),
        ["ls", path] if !path.starts_with('-') => Ok(Command::Ls {
            all: false,
            path: Some((*path).to_string()),
        }),
        ["pwd"] => Ok(Command::Pwd),
        ["cd", path] => Ok(Command::Cd {
            path: (*path).to_string(),
        }),
        ["cat", path] => Ok(Command::Cat {
            path: (*path).to_string(),
        }),
        ["diff", left, right] => Ok(Command::Diff {
            left: (*left).to_string(),
            right: (*right).to_string(),
        }),
        ["tar", "-xvzf", archive] => Ok(Command::TarExtract {
            archive: (*archive).to_string(),
        }),
        ["cp", src, dst] => Ok(Command::Cp {
            src: (*src).to_string(),
            dst: (*dst).to_string(),
        }),
        ["chmod", "+x", path] => Ok(Command::Chmod {
            path: (*path).to_string(),
        }),
        ["ps"] | ["ps", "-ef"] => Ok(Command::Ps { forest: false }),
        ["ps", "--forest"] | ["ps", "-ef", "--forest"] => Ok(Command::Ps { forest: true }),
        ["lsof", "-p", pid] => parse_pid(pid)
            .map(|pid| Command::Lsof { pid })
            .ok_or_else(invalid),
        ["kill", "-9", pid] => parse_pid(pid)
            .map(|pid| Command::Kill { pid })
            .ok_or_else(invalid),
        ["rm", path] => Ok(Command::Rm {
            path: (*path).to_string(),
        }),
        _ => Err(invalid()),
    }
}

fn parse_pid(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
