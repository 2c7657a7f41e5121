//! Operator side of the link: connects to a controller and answers its requests.

use std::io::{BufRead, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::report::render_results;
use crate::link::LinkResult;
use crate::link::protocol::{ControllerMessage, MessageDecoder, encode_answer, encode_selection_response};
use crate::results::ResultsTable;

/// The human (or script) behind the console.
pub trait Operator {
    fn choose_groups(&mut self, names: &[String]) -> Vec<bool>;
    fn answer(&mut self, question: &str, true_label: &str, false_label: &str) -> bool;
    fn show_results(&mut self, results: &ResultsTable);
}

/// Answer controller messages until the controller closes the connection.
///
/// Returns the number of results tables received.
pub async fn serve<R, W, O>(reader: R, mut writer: W, operator: &mut O) -> LinkResult<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    O: Operator + ?Sized,
{
    let mut lines = reader.lines();
    let mut decoder = MessageDecoder::new();
    let mut received = 0;

    while let Some(line) = lines.next_line().await? {
        let Some(message) = decoder.push_line(&line)? else {
            continue;
        };
        match message {
            ControllerMessage::SelectionRequest(names) => {
                debug!(groups = names.len(), "selection requested");
                let selection = operator.choose_groups(&names);
                writer.write_all(encode_selection_response(&selection).as_bytes()).await?;
                writer.flush().await?;
            }
            ControllerMessage::Question {
                question,
                true_label,
                false_label,
            } => {
                debug!(%question, "question received");
                let answer = operator.answer(&question, &true_label, &false_label);
                writer.write_all(encode_answer(answer).as_bytes()).await?;
                writer.flush().await?;
            }
            ControllerMessage::Results(results) => {
                info!(summary = %results.summary(), "results received");
                operator.show_results(&results);
                received += 1;
            }
        }
    }
    Ok(received)
}

// ============================================================================
// Terminal operator
// ============================================================================

/// Prompts on a terminal.
pub struct TerminalOperator<I, W> {
    input: I,
    output: W,
    select_all: bool,
    color: bool,
}

impl TerminalOperator<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio(select_all: bool, color: bool) -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout(), select_all, color)
    }
}

impl<I: BufRead, W: Write> TerminalOperator<I, W> {
    pub fn new(input: I, output: W, select_all: bool, color: bool) -> Self {
        Self {
            input,
            output,
            select_all,
            color,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Ask until the reply is recognisable. End of input picks `default`.
    fn ask_yes_no(&mut self, prompt: &str, default: bool) -> bool {
        loop {
            let _ = write!(self.output, "{prompt}");
            let _ = self.output.flush();

            let mut reply = String::new();
            match self.input.read_line(&mut reply) {
                Ok(0) | Err(_) => return default,
                Ok(_) => {}
            }
            match reply.trim().to_ascii_lowercase().as_str() {
                "" => return default,
                "y" | "yes" | "t" | "true" => return true,
                "n" | "no" | "f" | "false" => return false,
                _ => {
                    let _ = writeln!(self.output, "please answer y or n");
                }
            }
        }
    }
}

impl<I: BufRead, W: Write> Operator for TerminalOperator<I, W> {
    fn choose_groups(&mut self, names: &[String]) -> Vec<bool> {
        let _ = writeln!(self.output, "Test groups available:");
        for (index, name) in names.iter().enumerate() {
            let _ = writeln!(self.output, "  {}. {}", index + 1, name);
        }
        if self.select_all {
            let _ = writeln!(self.output, "Running all {} groups", names.len());
            return vec![true; names.len()];
        }
        names
            .iter()
            .map(|name| self.ask_yes_no(&format!("Run '{name}'? [Y/n] "), true))
            .collect()
    }

    fn answer(&mut self, question: &str, true_label: &str, false_label: &str) -> bool {
        let _ = writeln!(self.output, "{question}");
        self.ask_yes_no(&format!("  y) {true_label}  n) {false_label}: "), false)
    }

    fn show_results(&mut self, results: &ResultsTable) {
        let _ = write!(self.output, "{}", render_results(results, self.color));
        let _ = self.output.flush();
    }
}
