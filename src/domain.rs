//! Domain models: quiz definitions, per-user progress, and judge verdicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One prompt/expected-answer pair. Position within the quiz is its index;
/// questions are presented strictly in sequence and never reordered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub expected: String,
}

/// Named ordered set of questions. Immutable once any progress record
/// references it, except by explicit admin deletion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    /// Hidden quizzes are excluded from assignment and student-facing stats
    /// but still show up (flagged) in the admin list.
    #[serde(default)]
    pub hidden: bool,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

/// Where a user stands in one quiz.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Assignable but not currently active. Also used when an in-progress
    /// record's quiz becomes unavailable (deleted or hidden): the record is
    /// parked here and resumes at the same index if the quiz comes back.
    NotStarted,
    InProgress,
    Passed,
    FailedExhausted,
}

impl ProgressStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProgressStatus::Passed | ProgressStatus::FailedExhausted)
    }
}

/// Durable per-(user, quiz) record. Key = (user_id, quiz_id), unique.
///
/// Invariants: `current_index <= questions.len()`; index == len only in a
/// terminal state; `attempts[i]` counts judged answers for question `i` and
/// never decreases.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizProgress {
    pub user_id: i64,
    pub quiz_id: String,
    pub status: ProgressStatus,
    pub current_index: usize,
    pub attempts: Vec<u32>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Questions cleared at the moment a terminal state was reached.
    #[serde(default)]
    pub score: Option<u32>,
}

impl QuizProgress {
    pub fn start(user_id: i64, quiz: &Quiz, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            quiz_id: quiz.id.clone(),
            status: ProgressStatus::InProgress,
            current_index: 0,
            attempts: vec![0; quiz.questions.len()],
            started_at: now,
            updated_at: now,
            score: None,
        }
    }

    pub fn total_attempts(&self) -> u32 {
        self.attempts.iter().sum()
    }
}

/// The judge's decision on one candidate answer.
#[derive(Clone, Debug, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    #[serde(default)]
    pub rationale: String,
}
