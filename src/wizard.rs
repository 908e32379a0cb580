//! Authoring wizard: per-operator multi-step construction of a new quiz.
//!
//! Purely in-memory (restart drops open sessions; authoring is a
//! supervised, low-frequency admin action). While a session is open, any
//! text is literal content for the current phase; only /done, /confirm and
//! /cancel drive transitions, so titles, questions and answers may contain
//! arbitrary text.

use tracing::{info, instrument};

use crate::domain::{Question, Quiz};
use crate::error::WizardError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WizardPhase {
    AwaitingTitle,
    AwaitingQuestion,
    /// Holds the question prompt while we wait for its expected answer.
    AwaitingAnswer { prompt: String },
    AwaitingConfirm,
}

#[derive(Clone, Debug)]
pub struct WizardState {
    pub quiz_id: String,
    pub title: String,
    pub questions: Vec<Question>,
    pub phase: WizardPhase,
}

pub enum WizardInput<'a> {
    Text(&'a str),
    Done,
    Confirm,
    Cancel,
}

#[derive(Debug)]
pub enum WizardOutcome {
    /// Session continues; send this prompt back to the operator.
    Reply(String),
    /// Operator confirmed; the caller persists the quiz and closes the
    /// session (or keeps it open if the id turned out to be taken).
    Commit(Quiz),
    /// Session discarded; nothing was written.
    Cancelled,
}

/// Open a session for `quiz_id` (uniqueness is the caller's check, against
/// the loaded quiz document).
pub fn open(quiz_id: &str) -> (WizardState, String) {
    let state = WizardState {
        quiz_id: quiz_id.to_string(),
        title: String::new(),
        questions: Vec::new(),
        phase: WizardPhase::AwaitingTitle,
    };
    let greeting = format!(
        "Creating quiz {quiz_id}. Send the quiz title. /cancel aborts at any point."
    );
    (state, greeting)
}

/// Advance the session one step. Errors leave the phase untouched so the
/// operator can correct the input.
#[instrument(level = "debug", skip_all, fields(quiz_id = %state.quiz_id))]
pub fn advance(state: &mut WizardState, input: WizardInput<'_>) -> Result<WizardOutcome, WizardError> {
    if let WizardInput::Cancel = input {
        info!(target: "quiz", quiz_id = %state.quiz_id, "Authoring cancelled");
        return Ok(WizardOutcome::Cancelled);
    }

    match (&state.phase, input) {
        (WizardPhase::AwaitingTitle, WizardInput::Text(t)) => {
            let title = t.trim();
            if title.is_empty() {
                return Err(WizardError::EmptyInput);
            }
            state.title = title.to_string();
            state.phase = WizardPhase::AwaitingQuestion;
            Ok(WizardOutcome::Reply(
                "Title saved. Send question 1, or /done once all questions are in.".into(),
            ))
        }
        (WizardPhase::AwaitingTitle, _) => Err(WizardError::MissingTitle),

        (WizardPhase::AwaitingQuestion, WizardInput::Text(t)) => {
            let prompt = t.trim();
            if prompt.is_empty() {
                return Err(WizardError::EmptyInput);
            }
            let n = state.questions.len() + 1;
            state.phase = WizardPhase::AwaitingAnswer { prompt: prompt.to_string() };
            Ok(WizardOutcome::Reply(format!(
                "Question {n} recorded. Now send the expected answer."
            )))
        }
        (WizardPhase::AwaitingQuestion, WizardInput::Done) => {
            if state.questions.is_empty() {
                return Err(WizardError::NoQuestions);
            }
            state.phase = WizardPhase::AwaitingConfirm;
            Ok(WizardOutcome::Reply(summary(state)))
        }
        (WizardPhase::AwaitingQuestion, _) => Err(WizardError::NotReadyToConfirm),

        (WizardPhase::AwaitingAnswer { prompt }, WizardInput::Text(t)) => {
            let expected = t.trim();
            if expected.is_empty() {
                return Err(WizardError::EmptyInput);
            }
            let prompt = prompt.clone();
            state.questions.push(Question { prompt, expected: expected.to_string() });
            state.phase = WizardPhase::AwaitingQuestion;
            let n = state.questions.len();
            Ok(WizardOutcome::Reply(format!(
                "Answer saved ({n} question(s) so far). Send question {}, or /done.",
                n + 1
            )))
        }
        (WizardPhase::AwaitingAnswer { .. }, _) => Err(WizardError::AnswerPending),

        (WizardPhase::AwaitingConfirm, WizardInput::Confirm) => {
            if state.questions.is_empty() {
                return Err(WizardError::NoQuestions);
            }
            info!(target: "quiz", quiz_id = %state.quiz_id, questions = state.questions.len(), "Authoring confirmed");
            Ok(WizardOutcome::Commit(Quiz {
                id: state.quiz_id.clone(),
                title: state.title.clone(),
                hidden: false,
                questions: state.questions.clone(),
            }))
        }
        (WizardPhase::AwaitingConfirm, _) => Err(WizardError::ConfirmOrCancel),
    }
}

fn summary(state: &WizardState) -> String {
    let mut lines = vec![format!(
        "Quiz {}: {} ({} question(s)):",
        state.quiz_id,
        state.title,
        state.questions.len()
    )];
    for (i, q) in state.questions.iter().enumerate() {
        lines.push(format!("{}. {} -> {}", i + 1, q.prompt, q.expected));
    }
    lines.push("Send /confirm to save or /cancel to discard.".into());
    lines.join("\n")
}
