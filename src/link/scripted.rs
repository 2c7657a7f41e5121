//! In-process [`Console`] with canned console replies.
//!
//! Follows the same state machine and rejection rules as [`Link`](super::Link) but answers from a
//! script instead of a socket. Replies are given as wire lines and decoded with the real protocol
//! codec, so malformed answers fail exactly as they would over TCP.
//!
//! A reply supplied before the matching request is queued; a request made before its reply stays
//! pending until [`ScriptedConsole::reply_selection`] / [`ScriptedConsole::reply_answer`] is
//! called.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::pending::{Pending, Resolver, pending};
use super::protocol;
use super::{Console, LinkError, LinkResult, ProtocolState};
use crate::results::ResultsTable;

#[derive(Debug, Default)]
struct Script {
    state: Option<ProtocolState>,
    busy: bool,
    unattended: bool,
    selection_replies: VecDeque<String>,
    answer_replies: VecDeque<String>,
    waiting_selection: Option<(usize, Resolver<Vec<bool>>)>,
    waiting_answer: Option<Resolver<bool>>,
    selection_requests: Vec<Vec<String>>,
    questions: Vec<String>,
    published: Vec<ResultsTable>,
    resets: usize,
}

impl Script {
    fn state(&self) -> ProtocolState {
        self.state.unwrap_or(ProtocolState::Disconnected)
    }

    fn admit(&self, expected: ProtocolState) -> LinkResult<()> {
        let actual = self.state();
        if actual == ProtocolState::Disconnected {
            return Err(LinkError::NoConnection);
        }
        if actual != expected {
            return Err(LinkError::WrongState { expected, actual });
        }
        if self.busy {
            return Err(LinkError::Busy);
        }
        Ok(())
    }

    fn resolve_selection(&mut self, expected: usize, reply: Resolver<Vec<bool>>, line: &str) {
        self.busy = false;
        let result = protocol::decode_selection_response(line, expected).map_err(LinkError::from);
        if result.is_ok() {
            self.state = Some(ProtocolState::Running);
        }
        reply.resolve(result);
    }

    fn resolve_answer(&mut self, reply: Resolver<bool>, line: &str) {
        self.busy = false;
        reply.resolve(protocol::decode_answer(line).map_err(LinkError::from));
    }
}

/// Scripted operator console.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    script: RefCell<Script>,
}

impl ScriptedConsole {
    /// A console that is already attached (`Holding`).
    pub fn new() -> Self {
        let console = Self::default();
        console.connect();
        console
    }

    /// A console that has not connected yet.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// No operator: every group is selected and every question gets its false answer.
    pub fn unattended() -> Self {
        let console = Self::new();
        console.script.borrow_mut().unattended = true;
        console
    }

    /// Attach, as if a console had just connected.
    pub fn connect(&self) {
        let mut script = self.script.borrow_mut();
        script.state = Some(ProtocolState::Holding);
        script.busy = false;
    }

    /// Lose the connection; requests in flight fail with [`LinkError::ConnectionClosed`].
    pub fn disconnect(&self) {
        let mut script = self.script.borrow_mut();
        script.state = Some(ProtocolState::Disconnected);
        script.busy = false;
        if let Some((_, reply)) = script.waiting_selection.take() {
            reply.resolve(Err(LinkError::ConnectionClosed));
        }
        if let Some(reply) = script.waiting_answer.take() {
            reply.resolve(Err(LinkError::ConnectionClosed));
        }
    }

    /// Answer the pending selection request, or the next one.
    pub fn reply_selection(&self, line: &str) {
        let mut script = self.script.borrow_mut();
        match script.waiting_selection.take() {
            Some((expected, reply)) => script.resolve_selection(expected, reply, line),
            None => script.selection_replies.push_back(line.to_string()),
        }
    }

    /// Answer the pending question, or the next one.
    pub fn reply_answer(&self, line: &str) {
        let mut script = self.script.borrow_mut();
        match script.waiting_answer.take() {
            Some(reply) => script.resolve_answer(reply, line),
            None => script.answer_replies.push_back(line.to_string()),
        }
    }

    /// Group names of every selection request received, in order.
    pub fn selection_requests(&self) -> Vec<Vec<String>> {
        self.script.borrow().selection_requests.clone()
    }

    /// Every question asked, in order.
    pub fn questions(&self) -> Vec<String> {
        self.script.borrow().questions.clone()
    }

    /// Every results table published, in order.
    pub fn published(&self) -> Vec<ResultsTable> {
        self.script.borrow().published.clone()
    }

    pub fn resets(&self) -> usize {
        self.script.borrow().resets
    }
}

impl Console for ScriptedConsole {
    fn state(&self) -> ProtocolState {
        self.script.borrow().state()
    }

    fn request_group_selection(&self, names: &[String]) -> LinkResult<Pending<Vec<bool>>> {
        let mut script = self.script.borrow_mut();
        script.admit(ProtocolState::Holding)?;
        script.selection_requests.push(names.to_vec());

        let (reply, handle) = pending();
        if script.unattended {
            script.state = Some(ProtocolState::Running);
            reply.resolve(Ok(vec![true; names.len()]));
        } else if let Some(line) = script.selection_replies.pop_front() {
            script.resolve_selection(names.len(), reply, &line);
        } else {
            script.busy = true;
            script.waiting_selection = Some((names.len(), reply));
        }
        Ok(handle)
    }

    fn ask_question(&self, question: &str, _true_label: &str, _false_label: &str) -> LinkResult<Pending<bool>> {
        let mut script = self.script.borrow_mut();
        script.admit(ProtocolState::Running)?;
        script.questions.push(question.to_string());

        let (reply, handle) = pending();
        if script.unattended {
            reply.resolve(Ok(false));
        } else if let Some(line) = script.answer_replies.pop_front() {
            script.resolve_answer(reply, &line);
        } else {
            script.busy = true;
            script.waiting_answer = Some(reply);
        }
        Ok(handle)
    }

    fn publish_results(&self, results: &ResultsTable) -> LinkResult<Pending<()>> {
        let mut script = self.script.borrow_mut();
        script.admit(ProtocolState::Running)?;
        script.published.push(results.clone());
        script.state = Some(ProtocolState::Holding);
        Ok(Pending::ready(Ok(())))
    }

    /// Drops any waiting request and behaves as if the console reconnected at once.
    fn reset(&mut self) -> LinkResult<()> {
        let script = self.script.get_mut();
        script.resets += 1;
        script.waiting_selection = None;
        script.waiting_answer = None;
        script.busy = false;
        script.state = Some(ProtocolState::Holding);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::link::ProtocolViolation;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_queued_selection_reply_resolves_immediately() {
        let console = ScriptedConsole::new();
        console.reply_selection("TF");
        let mut handle = console.request_group_selection(&names(&["G1", "G2"])).unwrap();
        assert_eq!(handle.try_take().unwrap().unwrap(), vec![true, false]);
        assert_eq!(console.state(), ProtocolState::Running);
    }

    #[test]
    fn test_late_reply_resolves_waiting_request() {
        let console = ScriptedConsole::new();
        let mut handle = console.request_group_selection(&names(&["G1"])).unwrap();
        assert!(handle.try_take().is_none());
        assert!(matches!(
            console.request_group_selection(&names(&["G1"])),
            Err(LinkError::Busy)
        ));
        console.reply_selection("T");
        assert_eq!(handle.try_take().unwrap().unwrap(), vec![true]);
    }

    #[test]
    fn test_bad_selection_keeps_holding() {
        let console = ScriptedConsole::new();
        console.reply_selection("TX");
        let mut handle = console.request_group_selection(&names(&["A", "B"])).unwrap();
        assert!(matches!(
            handle.try_take(),
            Some(Err(LinkError::Protocol(ProtocolViolation::InvalidSelectionChar('X'))))
        ));
        assert_eq!(console.state(), ProtocolState::Holding);
    }

    #[test]
    fn test_question_requires_running() {
        let console = ScriptedConsole::new();
        let err = console.ask_question("Ready?", "Yes", "No").unwrap_err();
        assert!(matches!(
            err,
            LinkError::WrongState {
                expected: ProtocolState::Running,
                actual: ProtocolState::Holding
            }
        ));
        assert_eq!(console.state(), ProtocolState::Holding);
        assert!(console.questions().is_empty());
    }

    #[test]
    fn test_disconnected_rejects_everything() {
        let console = ScriptedConsole::disconnected();
        assert!(matches!(console.request_group_selection(&[]), Err(LinkError::NoConnection)));
        assert!(matches!(
            console.publish_results(&ResultsTable::new()),
            Err(LinkError::NoConnection)
        ));
    }

    #[test]
    fn test_disconnect_fails_waiting_question() {
        let console = ScriptedConsole::new();
        console.reply_selection("");
        console.request_group_selection(&[]).unwrap();
        let mut answer = console.ask_question("Arm up?", "Yes", "No").unwrap();
        console.disconnect();
        assert!(matches!(answer.try_take(), Some(Err(LinkError::ConnectionClosed))));
        assert_eq!(console.state(), ProtocolState::Disconnected);
    }

    #[test]
    fn test_publish_returns_to_holding() {
        let console = ScriptedConsole::unattended();
        console.request_group_selection(&names(&["G"])).unwrap();
        let mut table = ResultsTable::new();
        table.group_mut("G");
        let mut sent = console.publish_results(&table).unwrap();
        assert!(sent.try_take().unwrap().is_ok());
        assert_eq!(console.state(), ProtocolState::Holding);
        assert_eq!(console.published(), vec![table]);
    }

    #[test]
    fn test_unattended_answers_false() {
        let console = ScriptedConsole::unattended();
        let mut selection = console.request_group_selection(&names(&["A", "B"])).unwrap();
        assert_eq!(selection.try_take().unwrap().unwrap(), vec![true, true]);
        let mut answer = console.ask_question("Light on?", "Yes", "No").unwrap();
        assert!(!answer.try_take().unwrap().unwrap());
    }

    #[test]
    fn test_reset_drops_waiting_request() {
        let mut console = ScriptedConsole::new();
        let mut handle = console.request_group_selection(&names(&["G"])).unwrap();
        console.reset().unwrap();
        assert!(matches!(handle.try_take(), Some(Err(LinkError::WorkerStopped))));
        assert_eq!(console.state(), ProtocolState::Holding);
        assert_eq!(console.resets(), 1);
    }
}
