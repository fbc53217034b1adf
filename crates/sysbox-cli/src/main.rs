//! SysBox CLI - interactive terminal for the escape room
//!
//! Runs both rounds against in-memory stores. Round-1 shell commands are
//! typed directly at the prompt; round-2 Banker's operations are prefixed
//! with `bankers`:
//!
//!   bankers init
//!   bankers state
//!   bankers check
//!   bankers request <process> <amounts...>
//!   bankers release <process>
//!   bankers reset

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use sysbox::{
    BankersService, GameService, InMemoryBankersStore, InMemoryGameStore, RoundView, ServiceError,
    TracingActionLog,
};
use tracing_subscriber::EnvFilter;

const WORKSPACE_ID: &str = "local";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let game = GameService::new(
        Arc::new(InMemoryGameStore::new()),
        Arc::new(TracingActionLog),
    );
    let bankers = BankersService::new(Arc::new(InMemoryBankersStore::new()));

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        let state = game.state(WORKSPACE_ID).await?;
        write!(stdout, "sysbox:{} [{}]$ ", state.cwd, state.score)?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        if let Some(rest) = line.strip_prefix("bankers") {
            match run_bankers(&bankers, rest.trim()).await {
                Ok(text) => writeln!(stdout, "{text}")?,
                Err(err) => writeln!(stdout, "bankers: {err}")?,
            }
            continue;
        }

        match game.execute(WORKSPACE_ID, line).await {
            Ok(result) => {
                if !result.output.is_empty() {
                    writeln!(stdout, "{}", result.output)?;
                }
                if result.completed {
                    writeln!(stdout, "Session complete. Final score: {}", result.score)?;
                }
            }
            Err(ServiceError::SessionComplete) => {
                writeln!(stdout, "Session already completed.")?;
            }
            Err(ServiceError::InvalidCommand(err)) => {
                writeln!(stdout, "{err}")?;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

async fn run_bankers(service: &BankersService, args: &str) -> Result<String> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    match tokens.as_slice() {
        ["init"] => Ok(render_view(&service.initialize(WORKSPACE_ID).await?)),
        ["state"] => Ok(render_view(&service.state(WORKSPACE_ID).await?)),
        ["check"] => {
            let (report, view) = service.check_safety(WORKSPACE_ID).await?;
            let verdict = if report.safe {
                format!("SAFE, sequence: {}", report.safe_sequence.join(" -> "))
            } else {
                format!("UNSAFE, stuck: {}", report.unfinished.join(", "))
            };
            Ok(format!("{verdict}\nscore: {}", view.score))
        }
        ["request", process, amounts @ ..] if !amounts.is_empty() => {
            let i = parse_process(process)?;
            let request = parse_amounts(amounts)?;
            let (report, view) = service.request(WORKSPACE_ID, i, &request).await?;
            let mut out = if report.granted {
                "granted".to_string()
            } else {
                format!(
                    "denied: {}",
                    report.reason.unwrap_or_else(|| "unknown".to_string())
                )
            };
            if report.process_completed {
                out.push_str("\nprocess completed, resources auto-released");
            }
            if report.round_completed {
                out.push_str("\nall processes completed, round finished");
            }
            out.push_str(&format!("\n{}", render_view(&view)));
            Ok(out)
        }
        ["release", process] => {
            let i = parse_process(process)?;
            let view = service.release(WORKSPACE_ID, i).await?;
            Ok(render_view(&view))
        }
        ["reset"] => {
            service.reset(WORKSPACE_ID).await?;
            Ok("session reset".to_string())
        }
        _ => Ok(
            "usage: bankers init | state | check | request <p> <amounts...> | release <p> | reset"
                .to_string(),
        ),
    }
}

/// Accepts `P3` or a bare index.
fn parse_process(token: &str) -> Result<usize> {
    let digits = token.strip_prefix('P').unwrap_or(token);
    digits
        .parse()
        .map_err(|_| anyhow::anyhow!("bad process: {token}"))
}

fn parse_amounts(tokens: &[&str]) -> Result<Vec<u32>> {
    tokens
        .iter()
        .map(|t| t.parse().map_err(|_| anyhow::anyhow!("bad amount: {t}")))
        .collect()
}

fn render_view(view: &RoundView) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<6} {:>12} {:>12} {:>12}\n",
        "proc", "alloc", "max", "need"
    ));
    for (i, name) in view.processes.iter().enumerate() {
        out.push_str(&format!(
            "{:<6} {:>12} {:>12} {:>12}\n",
            name,
            join(&view.allocation[i]),
            join(&view.max_demand[i]),
            join(&view.need[i]),
        ));
    }
    out.push_str(&format!("available: {}\n", join(&view.available)));
    out.push_str(&format!("score: {}", view.score));
    if view.completed {
        out.push_str("\nround complete");
    }
    out
}

fn join(values: &[u32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
