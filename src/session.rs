//! Quiz session engine: drives one user through an assigned quiz.
//!
//! NotStarted → InProgress → {Passed, FailedExhausted}. Progression is
//! strictly linear by question index (no skipping, no backtracking), and
//! one exhausted question fails the whole quiz (course policy; the attempt
//! cap lives in config).
//!
//! Functions here operate on already-loaded collections and report whether
//! they dirtied the progress document; the dispatcher owns the store lock
//! and the save.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::config::PolicyConfig;
use crate::domain::{ProgressStatus, Quiz, QuizProgress};
use crate::error::JudgeUnavailable;
use crate::judge::Judge;

pub struct SessionReply {
    pub messages: Vec<String>,
    pub dirty: bool,
}

impl SessionReply {
    fn clean(messages: Vec<String>) -> Self {
        Self { messages, dirty: false }
    }

    fn saved(messages: Vec<String>) -> Self {
        Self { messages, dirty: true }
    }
}

fn resolve<'a>(quizzes: &'a [Quiz], include_hidden: bool, id: &str) -> Option<&'a Quiz> {
    quizzes.iter().find(|q| q.id == id && (include_hidden || !q.hidden))
}

/// Index (into `progress`) of the user's active record, if its quiz still
/// resolves. At most one such record exists once orphans are demoted.
pub fn active_index(
    quizzes: &[Quiz],
    progress: &[QuizProgress],
    user_id: i64,
    include_hidden: bool,
) -> Option<usize> {
    progress.iter().position(|p| {
        p.user_id == user_id
            && p.status == ProgressStatus::InProgress
            && resolve(quizzes, include_hidden, &p.quiz_id).is_some()
    })
}

/// Park any in-progress record whose quiz was deleted or hidden away.
/// The record keeps its index and attempts and resumes if the quiz comes
/// back; meanwhile it no longer blocks a new assignment. Returns whether
/// anything changed.
pub fn demote_orphans(
    quizzes: &[Quiz],
    progress: &mut [QuizProgress],
    user_id: i64,
    include_hidden: bool,
) -> bool {
    let mut dirty = false;
    for p in progress.iter_mut() {
        if p.user_id == user_id
            && p.status == ProgressStatus::InProgress
            && resolve(quizzes, include_hidden, &p.quiz_id).is_none()
        {
            warn!(target: "quiz", user_id, quiz_id = %p.quiz_id, "Active quiz no longer available; parking progress");
            p.status = ProgressStatus::NotStarted;
            dirty = true;
        }
    }
    dirty
}

fn question_text(quiz: &Quiz, index: usize) -> String {
    let total = quiz.questions.len();
    let prompt = quiz.question(index).map(|q| q.prompt.as_str()).unwrap_or_default();
    format!("Quiz {}: {}.\n\nQuestion {}/{}:\n{}", quiz.id, quiz.title, index + 1, total, prompt)
}

/// `/quiz`: resume the active quiz (idempotent, re-emits the current
/// question) or assign the first quiz, in stored order, that the user has
/// not finished.
#[instrument(level = "info", skip(quizzes, progress), fields(user_id))]
pub fn start_or_resume(
    quizzes: &[Quiz],
    progress: &mut Vec<QuizProgress>,
    user_id: i64,
    include_hidden: bool,
    now: DateTime<Utc>,
) -> SessionReply {
    let demoted = demote_orphans(quizzes, progress, user_id, include_hidden);

    if let Some(i) = active_index(quizzes, progress, user_id, include_hidden) {
        let p = &progress[i];
        // Re-emit only: a repeated /quiz must not mutate anything.
        if let Some(quiz) = resolve(quizzes, include_hidden, &p.quiz_id) {
            let msg = format!("Quiz {} is already in progress.\n\n{}", quiz.id, question_text(quiz, p.current_index));
            return SessionReply { messages: vec![msg], dirty: demoted };
        }
    }

    let candidates: Vec<&Quiz> = quizzes.iter().filter(|q| include_hidden || !q.hidden).collect();
    if candidates.is_empty() {
        return SessionReply { messages: vec!["There are no quizzes yet.".into()], dirty: demoted };
    }

    for quiz in candidates {
        match progress.iter().position(|p| p.user_id == user_id && p.quiz_id == quiz.id) {
            Some(i) if progress[i].status.is_terminal() => continue,
            Some(i) => {
                // Parked earlier; resume at the same index.
                progress[i].status = ProgressStatus::InProgress;
                progress[i].updated_at = now;
                let index = progress[i].current_index;
                info!(target: "quiz", user_id, quiz_id = %quiz.id, index, "Quiz resumed");
                return SessionReply::saved(vec![question_text(quiz, index)]);
            }
            None => {
                progress.push(QuizProgress::start(user_id, quiz, now));
                info!(target: "quiz", user_id, quiz_id = %quiz.id, "Quiz assigned");
                return SessionReply::saved(vec![question_text(quiz, 0)]);
            }
        }
    }

    SessionReply {
        messages: vec!["All quizzes are done. Nothing left to take, great work!".into()],
        dirty: demoted,
    }
}

/// Free-text message while a quiz is in progress: judge it as the answer to
/// the current question and advance the state machine.
///
/// Returns None when the user has no active quiz (after parking orphans);
/// the caller decides what to say then.
#[instrument(level = "info", skip_all, fields(user_id, answer_len = answer.len()))]
pub async fn submit_answer<J: Judge>(
    quizzes: &[Quiz],
    progress: &mut [QuizProgress],
    judge: &J,
    policy: &PolicyConfig,
    user_id: i64,
    include_hidden: bool,
    answer: &str,
    now: DateTime<Utc>,
) -> Option<SessionReply> {
    let i = active_index(quizzes, progress, user_id, include_hidden)?;
    let quiz = resolve(quizzes, include_hidden, &progress[i].quiz_id)?.clone();
    let index = progress[i].current_index;
    let question = quiz.question(index)?.clone();

    // Bounded retry budget; an answer is never scored wrong because the
    // judge was unreachable, and state stays untouched on exhaustion.
    let mut verdict = None;
    for attempt in 0..=policy.judge_retries {
        match judge.evaluate(&question.prompt, &question.expected, answer).await {
            Ok(v) => {
                verdict = Some(v);
                break;
            }
            Err(JudgeUnavailable(reason)) => {
                warn!(target: "judge", user_id, quiz_id = %quiz.id, attempt, %reason, "Judge call failed");
            }
        }
    }
    let Some(verdict) = verdict else {
        return Some(SessionReply::clean(vec![
            "The answer checker is unavailable right now. Your attempt was not counted; please try again later."
                .into(),
        ]));
    };

    let p = &mut progress[i];
    if p.attempts.len() < quiz.questions.len() {
        p.attempts.resize(quiz.questions.len(), 0);
    }
    p.attempts[index] += 1;
    p.updated_at = now;

    if verdict.passed {
        p.current_index += 1;
        if p.current_index == quiz.questions.len() {
            p.status = ProgressStatus::Passed;
            p.score = Some(quiz.questions.len() as u32);
            let summary = format!(
                "Correct!\n\nQuiz {} passed: {}/{} questions, {} attempts total. Send /quiz for the next one.",
                quiz.id,
                quiz.questions.len(),
                quiz.questions.len(),
                p.total_attempts()
            );
            info!(target: "quiz", user_id, quiz_id = %quiz.id, attempts = p.total_attempts(), "Quiz passed");
            return Some(SessionReply::saved(vec![summary]));
        }
        let next = question_text(&quiz, p.current_index);
        return Some(SessionReply::saved(vec!["Correct!".into(), next]));
    }

    let spent = p.attempts[index];
    let rationale = if verdict.rationale.trim().is_empty() {
        "Wrong answer.".to_string()
    } else {
        format!("Wrong answer: {}", verdict.rationale.trim())
    };

    if spent >= policy.max_attempts_per_question {
        p.status = ProgressStatus::FailedExhausted;
        p.score = Some(p.current_index as u32);
        info!(target: "quiz", user_id, quiz_id = %quiz.id, question = index, "Attempts exhausted; quiz failed");
        let msg = format!(
            "{}\n\nThat was attempt {}/{} for this question; quiz {} is closed. Score: {}/{} questions.",
            rationale,
            spent,
            policy.max_attempts_per_question,
            quiz.id,
            p.current_index,
            quiz.questions.len()
        );
        return Some(SessionReply::saved(vec![msg]));
    }

    let msg = format!(
        "{}\n\nAttempt {}/{}. Try again:\n{}",
        rationale,
        spent,
        policy.max_attempts_per_question,
        question.prompt
    );
    Some(SessionReply::saved(vec![msg]))
}
