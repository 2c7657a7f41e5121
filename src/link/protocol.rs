//! Line protocol spoken with the operator console.
//!
//! Every message is a sequence of `\n` terminated lines:
//!
//! | exchange | controller sends | console answers |
//! |---|---|---|
//! | group selection | one line per group name, then `END_SELECTION` | one line, a `T`/`F` per group |
//! | question | `BEGIN_QUESTION`, question, true label, false label | one line starting with `T` or `F` |
//! | results | per group `G:<name>`, per test `<S\|F\|N>:<name>` and a message line, then `END_RESULTS` | nothing |
//!
//! Both directions are implemented here: the controller side (`encode_*` requests, `decode_*`
//! answers) and the console side ([`MessageDecoder`], [`encode_selection_response`]).

use std::borrow::Cow;

use thiserror::Error;

use crate::results::{Outcome, ResultsTable, TestReport};

pub const GROUP_SELECTION_TERMINATOR: &str = "END_SELECTION";
pub const RESULTS_TERMINATOR: &str = "END_RESULTS";
pub const QUESTION_HEADER: &str = "BEGIN_QUESTION";
pub const GROUP_PREFIX: &str = "G:";
pub const DEFAULT_PORT: u16 = 5809;

/// The peer sent something the protocol does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("console gave an invalid response char to selection request, '{0}'")]
    InvalidSelectionChar(char),

    #[error("selection response has {actual} entries for {expected} groups")]
    SelectionLength { expected: usize, actual: usize },

    #[error("console gave an invalid response char to question, '{0}'")]
    InvalidAnswerChar(char),

    #[error("console gave an empty response to question")]
    EmptyAnswer,

    #[error("unexpected line in results: {0:?}")]
    UnexpectedResultsLine(String),
}

// ============================================================================
// Framing helpers
// ============================================================================

/// Strip a trailing `\n` or `\r\n`.
pub fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Make free text safe to send as one line: line breaks become spaces.
pub fn single_line(text: &str) -> Cow<'_, str> {
    if text.contains(['\n', '\r']) {
        Cow::Owned(text.replace("\r\n", " ").replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(text)
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(&single_line(line));
    out.push('\n');
}

// ============================================================================
// Controller side
// ============================================================================

/// Group names followed by the selection terminator.
pub fn encode_selection_request(names: &[String]) -> String {
    let mut out = String::new();
    for name in names {
        push_line(&mut out, name);
    }
    push_line(&mut out, GROUP_SELECTION_TERMINATOR);
    out
}

/// Parse the console's selection line; one `T`/`F` per requested group.
pub fn decode_selection_response(line: &str, expected: usize) -> Result<Vec<bool>, ProtocolViolation> {
    let line = trim_line_ending(line);
    let selection = line
        .chars()
        .map(|c| match c {
            'T' => Ok(true),
            'F' => Ok(false),
            other => Err(ProtocolViolation::InvalidSelectionChar(other)),
        })
        .collect::<Result<Vec<bool>, _>>()?;

    if selection.len() != expected {
        return Err(ProtocolViolation::SelectionLength {
            expected,
            actual: selection.len(),
        });
    }
    Ok(selection)
}

/// Question header, question and both option labels.
pub fn encode_question(question: &str, true_label: &str, false_label: &str) -> String {
    let mut out = String::new();
    push_line(&mut out, QUESTION_HEADER);
    push_line(&mut out, question);
    push_line(&mut out, true_label);
    push_line(&mut out, false_label);
    out
}

/// Parse the console's answer; only the first character matters.
pub fn decode_answer(line: &str) -> Result<bool, ProtocolViolation> {
    match trim_line_ending(line).chars().next() {
        Some('T') => Ok(true),
        Some('F') => Ok(false),
        Some(other) => Err(ProtocolViolation::InvalidAnswerChar(other)),
        None => Err(ProtocolViolation::EmptyAnswer),
    }
}

/// The whole results table followed by the results terminator.
pub fn encode_results(results: &ResultsTable) -> String {
    let mut out = String::new();
    for group in results.groups() {
        push_line(&mut out, &format!("{}{}", GROUP_PREFIX, group.name));
        for (test, report) in &group.tests {
            push_line(&mut out, &format!("{}:{}", report.outcome.code(), test));
            push_line(&mut out, &report.message);
        }
    }
    push_line(&mut out, RESULTS_TERMINATOR);
    out
}

// ============================================================================
// Console side
// ============================================================================

/// Selection line for the given choices.
pub fn encode_selection_response(selection: &[bool]) -> String {
    let mut out: String = selection.iter().map(|&keep| if keep { 'T' } else { 'F' }).collect();
    out.push('\n');
    out
}

/// Answer line for a question.
pub fn encode_answer(answer: bool) -> &'static str {
    if answer { "T\n" } else { "F\n" }
}

/// A complete message received from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerMessage {
    SelectionRequest(Vec<String>),
    Question {
        question: String,
        true_label: String,
        false_label: String,
    },
    Results(ResultsTable),
}

#[derive(Debug, Default)]
enum DecodeState {
    #[default]
    Idle,
    Selection(Vec<String>),
    Question(Vec<String>),
    Results {
        table: ResultsTable,
        group: Option<String>,
        awaiting_message: Option<(Outcome, String)>,
    },
}

/// Incremental decoder for controller messages, fed one line at a time.
///
/// The first line of a message decides its kind: `BEGIN_QUESTION` starts a question, a `G:` line
/// or `END_RESULTS` starts results, anything else is the first group name of a selection request.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    state: DecodeState,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns a message once its last line has been seen.
    pub fn push_line(&mut self, line: &str) -> Result<Option<ControllerMessage>, ProtocolViolation> {
        let line = trim_line_ending(line);
        let state = std::mem::take(&mut self.state);

        let (next, message) = match state {
            DecodeState::Idle => {
                if line == QUESTION_HEADER {
                    (DecodeState::Question(Vec::new()), None)
                } else if line == RESULTS_TERMINATOR {
                    (DecodeState::Idle, Some(ControllerMessage::Results(ResultsTable::new())))
                } else if let Some(group) = line.strip_prefix(GROUP_PREFIX) {
                    let mut table = ResultsTable::new();
                    table.group_mut(group);
                    (
                        DecodeState::Results {
                            table,
                            group: Some(group.to_string()),
                            awaiting_message: None,
                        },
                        None,
                    )
                } else if line == GROUP_SELECTION_TERMINATOR {
                    (DecodeState::Idle, Some(ControllerMessage::SelectionRequest(Vec::new())))
                } else {
                    (DecodeState::Selection(vec![line.to_string()]), None)
                }
            }
            DecodeState::Selection(mut names) => {
                if line == GROUP_SELECTION_TERMINATOR {
                    (DecodeState::Idle, Some(ControllerMessage::SelectionRequest(names)))
                } else {
                    names.push(line.to_string());
                    (DecodeState::Selection(names), None)
                }
            }
            DecodeState::Question(mut parts) => {
                parts.push(line.to_string());
                if parts.len() == 3 {
                    let mut parts = parts.into_iter();
                    let message = ControllerMessage::Question {
                        question: parts.next().unwrap_or_default(),
                        true_label: parts.next().unwrap_or_default(),
                        false_label: parts.next().unwrap_or_default(),
                    };
                    (DecodeState::Idle, Some(message))
                } else {
                    (DecodeState::Question(parts), None)
                }
            }
            DecodeState::Results {
                mut table,
                group,
                awaiting_message,
            } => {
                if let Some((outcome, test)) = awaiting_message {
                    if let Some(group) = &group {
                        table.record(group, &test, TestReport::new(outcome, line));
                    }
                    (
                        DecodeState::Results {
                            table,
                            group,
                            awaiting_message: None,
                        },
                        None,
                    )
                } else if line == RESULTS_TERMINATOR {
                    (DecodeState::Idle, Some(ControllerMessage::Results(table)))
                } else if let Some(name) = line.strip_prefix(GROUP_PREFIX) {
                    table.group_mut(name);
                    (
                        DecodeState::Results {
                            table,
                            group: Some(name.to_string()),
                            awaiting_message: None,
                        },
                        None,
                    )
                } else {
                    let mut chars = line.chars();
                    let code = chars.next().and_then(Outcome::from_code);
                    let rest = chars.as_str().strip_prefix(':');
                    match (code, rest) {
                        (Some(outcome), Some(test)) => (
                            DecodeState::Results {
                                table,
                                group,
                                awaiting_message: Some((outcome, test.to_string())),
                            },
                            None,
                        ),
                        _ => return Err(ProtocolViolation::UnexpectedResultsLine(line.to_string())),
                    }
                }
            }
        };

        self.state = next;
        Ok(message)
    }

    /// Whether the decoder is between messages.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, DecodeState::Idle)
    }
}

/// Decode a complete results stream (as produced by [`encode_results`]).
pub fn decode_results<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Option<ResultsTable>, ProtocolViolation> {
    let mut decoder = MessageDecoder::new();
    for line in lines {
        match decoder.push_line(line)? {
            Some(ControllerMessage::Results(table)) => return Ok(Some(table)),
            Some(_) => return Err(ProtocolViolation::UnexpectedResultsLine(line.to_string())),
            None => {}
        }
    }
    Ok(None)
}

// ============================================================================
// Tests
// ============================================================================
