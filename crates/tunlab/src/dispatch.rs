//! Interactive command grammar and execution.
//!
//! One line of input maps to one [`Command`]. Malformed lines degrade to
//! a diagnostic and the session continues; only `halt` (and stdin EOF,
//! handled by the caller) ends it.

use std::io::Write;

use crate::error::HarnessError;
use crate::expand::{expand_vars, rewrite_log_paths};
use crate::registry::TunnelRegistry;

/// Emulator launcher binaries the `tunnel` verb is allowed to spawn.
const LAUNCHERS: [&str; 2] = ["mm-tunnelclient", "mm-tunnelserver"];

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Tunnel { id: u32, action: TunnelAction },
    Prompt(String),
    Halt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelAction {
    /// Spawn a launcher binary under the id.
    Launch(Vec<String>),
    /// Forward raw text to the child's stdin.
    Forward(String),
    /// Read one line from the child and print it.
    ReadLine,
}

/// What the main loop should do after a command executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// Parse one input line. `Ok(None)` means the line was empty.
pub fn parse(line: &str) -> Result<Option<Command>, HarnessError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, rest)) = tokens.split_first() else {
        return Ok(None);
    };

    match verb {
        "tunnel" => parse_tunnel(rest).map(Some),
        "prompt" => {
            if rest.len() != 1 {
                return Err(HarnessError::Usage("usage: prompt PROMPT".into()));
            }
            Ok(Some(Command::Prompt(rest[0].to_string())))
        }
        "halt" => {
            if !rest.is_empty() {
                return Err(HarnessError::Usage("usage: halt".into()));
            }
            Ok(Some(Command::Halt))
        }
        _ => Err(HarnessError::Usage(format!("unknown command: {line}"))),
    }
}

fn parse_tunnel(rest: &[&str]) -> Result<Command, HarnessError> {
    const USAGE: &str = "usage: tunnel ID CMD...";
    if rest.len() < 2 {
        return Err(HarnessError::Usage(USAGE.into()));
    }
    let id: u32 = rest[0]
        .parse()
        .map_err(|_| HarnessError::Usage(USAGE.into()))?;
    if id == 0 {
        return Err(HarnessError::Usage(USAGE.into()));
    }

    let tail = &rest[1..];
    let head = tail[0];
    if LAUNCHERS.contains(&head) {
        // Environment references are expanded over the whole command
        // text before re-splitting, then log-path arguments get home
        // expansion.
        let expanded = expand_vars(&tail.join(" "));
        let mut argv: Vec<String> = expanded.split_whitespace().map(str::to_string).collect();
        rewrite_log_paths(&mut argv);
        Ok(Command::Tunnel {
            id,
            action: TunnelAction::Launch(argv),
        })
    } else if head == "python" {
        // Raw passthrough keeps the leading token: the child's own shell
        // is the interpreter of this text, not the supervisor.
        Ok(Command::Tunnel {
            id,
            action: TunnelAction::Forward(tail.join(" ")),
        })
    } else if head == "readline" {
        if tail.len() != 1 {
            return Err(HarnessError::Usage("usage: tunnel ID readline".into()));
        }
        Ok(Command::Tunnel {
            id,
            action: TunnelAction::ReadLine,
        })
    } else {
        Err(HarnessError::Usage(format!(
            "unknown command after \"tunnel ID\": {}",
            tail.join(" ")
        )))
    }
}

/// Executes parsed commands against the registry and tracks the echo
/// prompt for the interactive session.
#[derive(Default)]
pub struct Dispatcher {
    prompt: String,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo an input line to the diagnostic stream, prefixed by the
    /// current prompt when one is set.
    fn echo(&self, line: &str) {
        if self.prompt.is_empty() {
            eprintln!("{line}");
        } else {
            eprintln!("{} {line}", self.prompt);
        }
    }

    /// Parse, echo, and execute one input line. Errors are reported and
    /// never stop the loop.
    pub async fn handle_line(&mut self, registry: &mut TunnelRegistry, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }
        self.echo(line);
        match parse(line) {
            Ok(Some(command)) => self.execute(registry, command).await,
            Ok(None) => Flow::Continue,
            Err(e) => {
                tracing::error!("{e}");
                Flow::Continue
            }
        }
    }

    /// Execute one command. `halt` tears down every channel before
    /// requesting loop exit.
    pub async fn execute(&mut self, registry: &mut TunnelRegistry, command: Command) -> Flow {
        match command {
            Command::Prompt(prompt) => {
                self.prompt = prompt;
                Flow::Continue
            }
            Command::Halt => {
                registry.teardown_all().await;
                Flow::Halt
            }
            Command::Tunnel { id, action } => {
                if let Err(e) = run_tunnel(registry, id, action).await {
                    tracing::error!("{e}");
                }
                Flow::Continue
            }
        }
    }
}

async fn run_tunnel(
    registry: &mut TunnelRegistry,
    id: u32,
    action: TunnelAction,
) -> Result<(), HarnessError> {
    match action {
        TunnelAction::Launch(argv) => registry.spawn(id, &argv).await,
        TunnelAction::Forward(text) => registry.write_line(id, &text).await,
        TunnelAction::ReadLine => {
            if let Some(line) = registry.read_line(id).await? {
                // The response goes to stdout, never the diagnostic
                // stream, so scripted callers can parse it.
                let mut out = std::io::stdout();
                let _ = writeln!(out, "{line}");
                let _ = out.flush();
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_parses_to_nothing() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn launch_command() {
        let cmd = parse("tunnel 1 mm-tunnelclient 192.168.0.1 9000").unwrap();
        assert_eq!(
            cmd,
            Some(Command::Tunnel {
                id: 1,
                action: TunnelAction::Launch(vec![
                    "mm-tunnelclient".into(),
                    "192.168.0.1".into(),
                    "9000".into(),
                ]),
            })
        );
    }

    #[test]
    fn launch_expands_env_and_log_paths() {
        std::env::set_var("TUNLAB_PARSE_PORT", "9001");
        let home = dirs::home_dir().expect("test host has a home dir");
        let cmd = parse("tunnel 2 mm-tunnelserver $TUNLAB_PARSE_PORT --ingress-log=~/in.log")
            .unwrap()
            .expect("command");
        let argv = match cmd {
            Command::Tunnel {
                id: 2,
                action: TunnelAction::Launch(argv),
            } => argv,
            other => panic!("expected launch, got {other:?}"),
        };
        assert_eq!(argv[1], "9001");
        assert_eq!(argv[2], format!("--ingress-log={}", home.join("in.log").display()));
    }

    #[test]
    fn python_forward_keeps_leading_token() {
        let cmd = parse("tunnel 3 python do_thing --flag").unwrap();
        assert_eq!(
            cmd,
            Some(Command::Tunnel {
                id: 3,
                action: TunnelAction::Forward("python do_thing --flag".into()),
            })
        );
    }

    #[test]
    fn readline_rejects_extra_args() {
        assert!(matches!(
            parse("tunnel 1 readline extra"),
            Err(HarnessError::Usage(_))
        ));
        assert_eq!(
            parse("tunnel 1 readline").unwrap(),
            Some(Command::Tunnel {
                id: 1,
                action: TunnelAction::ReadLine,
            })
        );
    }

    #[test]
    fn tunnel_usage_errors() {
        assert!(matches!(parse("tunnel"), Err(HarnessError::Usage(_))));
        assert!(matches!(parse("tunnel 1"), Err(HarnessError::Usage(_))));
        assert!(matches!(parse("tunnel x readline"), Err(HarnessError::Usage(_))));
        assert!(matches!(parse("tunnel -4 readline"), Err(HarnessError::Usage(_))));
        assert!(matches!(parse("tunnel 0 readline"), Err(HarnessError::Usage(_))));
        assert!(matches!(
            parse("tunnel 1 frobnicate now"),
            Err(HarnessError::Usage(_))
        ));
    }

    #[test]
    fn prompt_takes_exactly_one_arg() {
        assert_eq!(parse("prompt $").unwrap(), Some(Command::Prompt("$".into())));
        assert!(matches!(parse("prompt"), Err(HarnessError::Usage(_))));
        assert!(matches!(parse("prompt a b"), Err(HarnessError::Usage(_))));
    }

    #[test]
    fn halt_takes_no_args() {
        assert_eq!(parse("halt").unwrap(), Some(Command::Halt));
        assert!(matches!(parse("halt now"), Err(HarnessError::Usage(_))));
    }

    #[test]
    fn unknown_verb_is_usage_error() {
        assert!(matches!(parse("launch 1 foo"), Err(HarnessError::Usage(_))));
    }
}
