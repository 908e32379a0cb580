//! Typed error taxonomy.
//!
//! Collaborator failures are translated into one of these kinds at the
//! component boundary that invoked them; raw reqwest/serde/io errors never
//! reach the session engine or the wizard. Display strings double as the
//! operator-facing text, so they stay free of internal identifiers.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the durable state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document exists but fails structural validation. Fatal for the
    /// operation; surfaced to an admin, never silently repaired.
    #[error("state document {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state io failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The judge transport failed (network, timeout, or an unusable verdict).
/// Retried with a bounded budget; never scores an answer as wrong.
#[derive(Debug, Error)]
#[error("judge unavailable: {0}")]
pub struct JudgeUnavailable(pub String);

/// Malformed authoring input. The wizard session stays open for correction.
#[derive(Debug, Error)]
pub enum WizardError {
    #[error("Please send non-empty text.")]
    EmptyInput,
    #[error("Send the quiz title first.")]
    MissingTitle,
    #[error("The quiz has no questions yet. Send at least one question before /done.")]
    NoQuestions,
    #[error("Send the expected answer for the current question first.")]
    AnswerPending,
    #[error("Finish question entry with /done before confirming.")]
    NotReadyToConfirm,
    #[error("Reply /confirm to save the quiz or /cancel to discard it.")]
    ConfirmOrCancel,
    #[error("A quiz with id {0} already exists.")]
    DuplicateQuizId(String),
}

/// Command-level failures reported back to the caller with no state change.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Quiz with id {0} not found.")]
    UnknownQuiz(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
