//! Terminal transport — typed utterances in, printed replies out.
//!
//! Stands in for the speech pipeline: each stdin line is one already
//! transcribed utterance.
//!
//! Stdin is read on a detached OS thread. A blocking read there cannot
//! hold up runtime shutdown after Ctrl+C.

use async_trait::async_trait;
use oracle_core::error::TransportError;
use oracle_core::transport::Transport;
use std::io::{BufRead, Write};
use tokio::sync::mpsc;

const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

pub struct TerminalTransport {
    agent_name: String,
}

impl TerminalTransport {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
        }
    }

    fn prompt() {
        print!("  You > ");
        let _ = std::io::stdout().flush();
    }
}

pub fn is_exit_command(line: &str) -> bool {
    EXIT_COMMANDS.contains(&line)
}

fn write_reply(out: &mut impl Write, agent_name: &str, text: &str) -> std::io::Result<()> {
    writeln!(out)?;
    for line in text.lines() {
        writeln!(out, "  {agent_name} > {line}")?;
    }
    writeln!(out)?;
    out.flush()
}

/// Forward non-empty trimmed lines from `reader` until EOF, an exit command,
/// or the receiver going away. Blocks the calling thread.
fn forward_lines(reader: impl BufRead, tx: &mpsc::Sender<Result<String, TransportError>>) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if is_exit_command(line) {
                    break;
                }
                if tx.blocking_send(Ok(line.to_string())).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.blocking_send(Err(TransportError::ConnectionLost(e.to_string())));
                break;
            }
        }
    }
}

#[async_trait]
impl Transport for TerminalTransport {
    fn name(&self) -> &str {
        "terminal"
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<String, TransportError>>, TransportError> {
        let (tx, rx) = mpsc::channel(32);

        std::thread::Builder::new()
            .name("oracle-stdin".into())
            .spawn(move || forward_lines(std::io::stdin().lock(), &tx))
            .map_err(|e| TransportError::NotConfigured(format!("cannot read stdin: {e}")))?;

        Ok(rx)
    }

    async fn send(&self, text: &str) -> Result<(), TransportError> {
        write_reply(&mut std::io::stdout().lock(), &self.agent_name, text)
            .map_err(|e| TransportError::DeliveryFailed(e.to_string()))?;
        Self::prompt();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_commands() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command(":q"));
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command("What time is it?"));
    }

    #[test]
    fn lines_forward_until_exit() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = std::io::Cursor::new("  What time is it?  \n\n   \nquit\nnever read\n");
        forward_lines(input, &tx);
        drop(tx);

        assert_eq!(rx.blocking_recv().unwrap().unwrap(), "What time is it?");
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn eof_closes_the_stream() {
        let (tx, mut rx) = mpsc::channel(8);
        forward_lines(std::io::Cursor::new("Hello\nGoodbye"), &tx);
        drop(tx);

        assert_eq!(rx.blocking_recv().unwrap().unwrap(), "Hello");
        assert_eq!(rx.blocking_recv().unwrap().unwrap(), "Goodbye");
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn replies_are_prefixed_per_line() {
        let mut out = Vec::new();
        write_reply(&mut out, "Oracle", "Good evening.\nShall I?").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\n  Oracle > Good evening.\n  Oracle > Shall I?\n\n"
        );
    }

    #[test]
    fn transport_name() {
        assert_eq!(TerminalTransport::new("Oracle").name(), "terminal");
    }
}
