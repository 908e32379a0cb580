//! Message routing: tagged commands, wizard/session precedence, admin
//! gating, and translation of typed errors into plain-language replies.
//!
//! Routing order for an inbound private message: an open wizard session
//! consumes everything except the control tokens; otherwise a recognized
//! command runs its handler; remaining free text is an answer to the active
//! quiz when one exists. Group messages are ignored unless they carry a
//! command.

use chrono::Utc;
use tracing::{error, info, instrument};

use crate::config::BotConfig;
use crate::error::{DispatchError, WizardError};
use crate::judge::Judge;
use crate::protocol::{Inbound, Outbound};
use crate::session;
use crate::state::AppState;
use crate::stats;
use crate::wizard::{self, WizardInput, WizardOutcome};

const PRIVATE_ONLY: &str = "This command is available only in private messages with the bot.";
const ADMIN_ONLY: &str = "Not enough rights: this command is admin-only.";
const HELP: &str = "Commands:\n\
    /quiz - take (or resume) your next quiz\n\
    /quiz_stat - your progress\n\
    /help - this message\n\
    Admin: /new_quiz <id>, /quiz_list, /quiz_delete <id>, /quiz_admin_stat";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Quiz,
    QuizStat,
    NewQuiz { id: String },
    QuizList,
    QuizDelete { id: String },
    QuizAdminStat,
    Done,
    Confirm,
    Cancel,
    Help,
}

impl Command {
    /// Parse the leading token; `/cmd@botname` forms are accepted. Free
    /// text and unknown commands return None.
    pub fn parse(text: &str) -> Option<Command> {
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return None;
        }
        let mut parts = trimmed.split_whitespace();
        let head = parts.next()?;
        let name = head[1..].split('@').next().unwrap_or_default();
        let arg = parts.next().unwrap_or_default().to_string();
        match name {
            "quiz" => Some(Command::Quiz),
            "quiz_stat" => Some(Command::QuizStat),
            "new_quiz" => Some(Command::NewQuiz { id: arg }),
            "quiz_list" => Some(Command::QuizList),
            "quiz_delete" => Some(Command::QuizDelete { id: arg }),
            "quiz_admin_stat" => Some(Command::QuizAdminStat),
            "done" => Some(Command::Done),
            "confirm" => Some(Command::Confirm),
            "cancel" => Some(Command::Cancel),
            "help" | "start" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Entry point for one inbound message. Never panics, never leaks internal
/// errors to end users; corrupt-state failures notify the admins.
#[instrument(level = "info", skip(state, cfg, judge, msg), fields(user_id = msg.user_id, chat_id = msg.chat_id))]
pub async fn handle_message<J: Judge>(
    state: &AppState,
    cfg: &BotConfig,
    judge: &J,
    msg: &Inbound,
) -> Vec<Outbound> {
    match route(state, cfg, judge, msg).await {
        Ok(replies) => replies,
        Err(DispatchError::UnknownQuiz(id)) => {
            vec![Outbound::chat(msg.chat_id, format!("Quiz with id {id} not found."))]
        }
        Err(DispatchError::Store(e)) => {
            error!(target: "store", error = %e, "Durable state failure");
            vec![
                Outbound::chat(msg.chat_id, "Internal error. The admins have been notified."),
                Outbound::admins(format!("Durable state failure: {e}")),
            ]
        }
    }
}

async fn route<J: Judge>(
    state: &AppState,
    cfg: &BotConfig,
    judge: &J,
    msg: &Inbound,
) -> Result<Vec<Outbound>, DispatchError> {
    let cmd = Command::parse(&msg.text);
    let is_admin = cfg.is_admin(msg.user_id);

    // An open authoring session swallows everything except control tokens.
    if msg.is_private {
        let mut wizards = state.wizards.write().await;
        if let Some(ws) = wizards.get_mut(&msg.user_id) {
            let input = match cmd {
                Some(Command::Done) => WizardInput::Done,
                Some(Command::Confirm) => WizardInput::Confirm,
                Some(Command::Cancel) => WizardInput::Cancel,
                _ => WizardInput::Text(msg.text.trim()),
            };
            let reply = match wizard::advance(ws, input) {
                Ok(WizardOutcome::Reply(text)) => text,
                Ok(WizardOutcome::Cancelled) => {
                    wizards.remove(&msg.user_id);
                    "Authoring cancelled; nothing was saved.".into()
                }
                Ok(WizardOutcome::Commit(quiz)) => {
                    let store = state.store.write().await;
                    let mut quizzes = store.load_quizzes()?;
                    if quizzes.iter().any(|q| q.id == quiz.id) {
                        // Someone created the id mid-wizard; keep the
                        // session open so the work is not lost.
                        format!("A quiz with id {} already exists now. /cancel to discard yours.", quiz.id)
                    } else {
                        let text = format!("Done. Quiz {} saved with {} question(s).", quiz.id, quiz.questions.len());
                        quizzes.push(quiz);
                        store.save_quizzes(&quizzes)?;
                        wizards.remove(&msg.user_id);
                        text
                    }
                }
                Err(e) => e.to_string(),
            };
            return Ok(vec![Outbound::chat(msg.chat_id, reply)]);
        }
    }

    match cmd {
        Some(Command::Quiz) => {
            if !msg.is_private {
                return Ok(vec![Outbound::chat(msg.chat_id, PRIVATE_ONLY)]);
            }
            let store = state.store.write().await;
            let quizzes = store.load_quizzes()?;
            let mut progress = store.load_progress()?;
            let reply = session::start_or_resume(&quizzes, &mut progress, msg.user_id, is_admin, Utc::now());
            if reply.dirty {
                store.save_progress(&progress)?;
            }
            Ok(to_chat(msg.chat_id, reply.messages))
        }

        Some(Command::QuizStat) => {
            if !msg.is_private {
                return Ok(vec![Outbound::chat(msg.chat_id, PRIVATE_ONLY)]);
            }
            let store = state.store.read().await;
            let quizzes = store.load_quizzes()?;
            let progress = store.load_progress()?;
            Ok(vec![Outbound::chat(msg.chat_id, stats::student_report(&quizzes, &progress, msg.user_id))])
        }

        Some(Command::NewQuiz { id }) => {
            if !msg.is_private {
                return Ok(vec![Outbound::chat(msg.chat_id, PRIVATE_ONLY)]);
            }
            if !is_admin {
                return Ok(vec![Outbound::chat(msg.chat_id, ADMIN_ONLY)]);
            }
            if id.is_empty() {
                return Ok(vec![Outbound::chat(msg.chat_id, "Usage: /new_quiz <quiz_id>")]);
            }
            let store = state.store.read().await;
            if store.load_quizzes()?.iter().any(|q| q.id == id) {
                let err = WizardError::DuplicateQuizId(id);
                return Ok(vec![Outbound::chat(msg.chat_id, err.to_string())]);
            }
            drop(store);
            let mut wizards = state.wizards.write().await;
            let (ws, greeting) = wizard::open(&id);
            wizards.insert(msg.user_id, ws);
            info!(target: "quiz", user_id = msg.user_id, quiz_id = %id, "Authoring session opened");
            Ok(vec![Outbound::chat(msg.chat_id, greeting)])
        }

        Some(Command::QuizList) => {
            if !is_admin {
                return Ok(vec![Outbound::chat(msg.chat_id, ADMIN_ONLY)]);
            }
            let store = state.store.read().await;
            let quizzes = store.load_quizzes()?;
            if quizzes.is_empty() {
                return Ok(vec![Outbound::chat(msg.chat_id, "The quiz list is empty.")]);
            }
            let mut lines = vec!["Quizzes:".to_string()];
            for q in &quizzes {
                let flag = if q.hidden { ", hidden" } else { "" };
                lines.push(format!("- {}: {} ({} question(s){flag})", q.id, q.title, q.questions.len()));
            }
            Ok(vec![Outbound::chat(msg.chat_id, lines.join("\n"))])
        }

        Some(Command::QuizDelete { id }) => {
            if !is_admin {
                return Ok(vec![Outbound::chat(msg.chat_id, ADMIN_ONLY)]);
            }
            if id.is_empty() {
                return Ok(vec![Outbound::chat(msg.chat_id, "Usage: /quiz_delete <quiz_id>")]);
            }
            // Any wizard session building this id dies with it, whether or
            // not the quiz was confirmed into the store yet.
            let mut wizards = state.wizards.write().await;
            let open_before = wizards.len();
            wizards.retain(|_, ws| ws.quiz_id != id);
            let cancelled = open_before - wizards.len();
            drop(wizards);

            let store = state.store.write().await;
            let mut quizzes = store.load_quizzes()?;
            let before = quizzes.len();
            quizzes.retain(|q| q.id != id);
            if quizzes.len() == before {
                if cancelled > 0 {
                    info!(target: "quiz", quiz_id = %id, cancelled, "Unsaved quiz dropped with its authoring session");
                    return Ok(vec![Outbound::chat(
                        msg.chat_id,
                        format!("Quiz {id} was not saved yet; cancelled the open authoring session for it."),
                    )]);
                }
                return Err(DispatchError::UnknownQuiz(id));
            }
            store.save_quizzes(&quizzes)?;
            info!(target: "quiz", quiz_id = %id, "Quiz deleted; its progress records are now orphaned");
            Ok(vec![Outbound::chat(msg.chat_id, format!("Done. Deleted quiz {id}."))])
        }

        Some(Command::QuizAdminStat) => {
            if !is_admin {
                return Ok(vec![Outbound::chat(msg.chat_id, ADMIN_ONLY)]);
            }
            let store = state.store.read().await;
            let quizzes = store.load_quizzes()?;
            let progress = store.load_progress()?;
            Ok(vec![Outbound::chat(msg.chat_id, stats::admin_report(&quizzes, &progress))])
        }

        Some(Command::Done) | Some(Command::Confirm) | Some(Command::Cancel) => {
            Ok(vec![Outbound::chat(msg.chat_id, "No authoring session is open.")])
        }

        Some(Command::Help) => Ok(vec![Outbound::chat(msg.chat_id, HELP)]),

        // Free text: an answer when a quiz is active, otherwise a nudge.
        None => {
            if !msg.is_private {
                return Ok(Vec::new());
            }
            let store = state.store.write().await;
            let quizzes = store.load_quizzes()?;
            let mut progress = store.load_progress()?;
            let demoted = session::demote_orphans(&quizzes, &mut progress, msg.user_id, is_admin);
            match session::submit_answer(
                &quizzes,
                &mut progress,
                judge,
                &cfg.policy,
                msg.user_id,
                is_admin,
                msg.text.trim(),
                Utc::now(),
            )
            .await
            {
                Some(reply) => {
                    if reply.dirty || demoted {
                        store.save_progress(&progress)?;
                    }
                    Ok(to_chat(msg.chat_id, reply.messages))
                }
                None => {
                    if demoted {
                        store.save_progress(&progress)?;
                    }
                    Ok(vec![Outbound::chat(msg.chat_id, "Send /quiz to take a quiz, or /help for commands.")])
                }
            }
        }
    }
}

fn to_chat(chat_id: i64, messages: Vec<String>) -> Vec<Outbound> {
    messages.into_iter().map(|m| Outbound::chat(chat_id, m)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Verdict;
    use crate::error::JudgeUnavailable;
    use crate::protocol::Recipient;
    use crate::store::StateStore;
    use tempfile::tempdir;

    struct ExactJudge;

    impl Judge for ExactJudge {
        async fn evaluate(
            &self,
            _prompt: &str,
            expected: &str,
            candidate: &str,
        ) -> Result<Verdict, JudgeUnavailable> {
            Ok(Verdict {
                passed: expected.trim() == candidate.trim(),
                rationale: "exact comparison".into(),
            })
        }
    }

    fn cfg() -> BotConfig {
        let mut cfg = BotConfig::default();
        cfg.admin_users = vec![1];
        cfg
    }

    fn private(user_id: i64, text: &str) -> Inbound {
        Inbound { user_id, chat_id: user_id, text: text.into(), is_private: true }
    }

    async fn say(state: &AppState, user_id: i64, text: &str) -> Vec<Outbound> {
        handle_message(state, &cfg(), &ExactJudge, &private(user_id, text)).await
    }

    #[test]
    fn parse_recognizes_the_command_surface() {
        assert_eq!(Command::parse("/quiz"), Some(Command::Quiz));
        assert_eq!(Command::parse("  /quiz@coursebot  "), Some(Command::Quiz));
        assert_eq!(Command::parse("/new_quiz q7"), Some(Command::NewQuiz { id: "q7".into() }));
        assert_eq!(Command::parse("/quiz_delete"), Some(Command::QuizDelete { id: String::new() }));
        assert_eq!(Command::parse("/quiz_admin_stat"), Some(Command::QuizAdminStat));
        assert_eq!(Command::parse("plain text"), None);
        assert_eq!(Command::parse("/frobnicate"), None);
    }

    #[tokio::test]
    async fn authoring_commits_exactly_one_quiz() {
        let dir = tempdir().unwrap();
        let state = AppState::new(StateStore::new(dir.path()));

        say(&state, 1, "/new_quiz Q2").await;
        say(&state, 1, "Math warmup").await;
        say(&state, 1, "2+2=?").await;
        say(&state, 1, "4").await;
        say(&state, 1, "/done").await;
        let replies = say(&state, 1, "/confirm").await;
        assert!(replies[0].text.contains("saved"));

        let store = state.store.read().await;
        let quizzes = store.load_quizzes().unwrap();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].id, "Q2");
        assert_eq!(quizzes[0].questions.len(), 1);
    }

    #[tokio::test]
    async fn cancelling_leaves_the_document_untouched() {
        let dir = tempdir().unwrap();
        let state = AppState::new(StateStore::new(dir.path()));

        say(&state, 1, "/new_quiz Q2").await;
        say(&state, 1, "Math warmup").await;
        say(&state, 1, "2+2=?").await;
        say(&state, 1, "4").await;
        let replies = say(&state, 1, "/cancel").await;
        assert!(replies[0].text.contains("cancelled"));

        let store = state.store.read().await;
        assert!(store.load_quizzes().unwrap().is_empty());
        assert!(state.wizards.read().await.is_empty());
    }

    #[tokio::test]
    async fn non_admins_cannot_author_or_inspect() {
        let dir = tempdir().unwrap();
        let state = AppState::new(StateStore::new(dir.path()));
        for text in ["/new_quiz Q2", "/quiz_list", "/quiz_delete Q2", "/quiz_admin_stat"] {
            let replies = say(&state, 9, text).await;
            assert!(replies[0].text.contains("admin-only"), "{text}");
        }
    }

    #[tokio::test]
    async fn taking_a_quiz_end_to_end() {
        let dir = tempdir().unwrap();
        let state = AppState::new(StateStore::new(dir.path()));
        say(&state, 1, "/new_quiz Q1").await;
        say(&state, 1, "Warmup").await;
        say(&state, 1, "2+2=?").await;
        say(&state, 1, "4").await;
        say(&state, 1, "/done").await;
        say(&state, 1, "/confirm").await;

        let replies = say(&state, 9, "/quiz").await;
        assert!(replies[0].text.contains("2+2=?"));
        let replies = say(&state, 9, "4").await;
        assert!(replies[0].text.contains("passed: 1/1"));
        let replies = say(&state, 9, "/quiz_stat").await;
        assert!(replies[0].text.contains("✅ Q1"));
    }

    #[tokio::test]
    async fn deleting_a_missing_quiz_reports_unknown_id() {
        let dir = tempdir().unwrap();
        let state = AppState::new(StateStore::new(dir.path()));
        let replies = say(&state, 1, "/quiz_delete nope").await;
        assert!(replies[0].text.contains("not found"));
    }

    #[tokio::test]
    async fn deleting_an_id_under_construction_cancels_that_wizard() {
        let dir = tempdir().unwrap();
        let state = AppState::new(StateStore::new(dir.path()));
        let mut cfg = BotConfig::default();
        cfg.admin_users = vec![1, 2];

        handle_message(&state, &cfg, &ExactJudge, &private(1, "/new_quiz QX")).await;
        assert!(state.wizards.read().await.contains_key(&1));

        // A second admin deletes the id before it was ever confirmed.
        let replies = handle_message(&state, &cfg, &ExactJudge, &private(2, "/quiz_delete QX")).await;
        assert!(replies[0].text.contains("not saved yet"), "{}", replies[0].text);
        assert!(state.wizards.read().await.is_empty());

        // The author is out of the wizard: free text is plain chat again.
        let replies = handle_message(&state, &cfg, &ExactJudge, &private(1, "hello")).await;
        assert!(replies[0].text.contains("/quiz"));
    }

    #[tokio::test]
    async fn corrupt_state_notifies_admins_without_leaking_details() {
        let dir = tempdir().unwrap();
        let state = AppState::new(StateStore::new(dir.path()));
        std::fs::write(dir.path().join("quizzes.json"), "{ broken").unwrap();

        let replies = say(&state, 9, "/quiz").await;
        assert_eq!(replies.len(), 2);
        assert!(replies[0].text.contains("Internal error"));
        assert!(!replies[0].text.contains("quizzes.json"));
        assert_eq!(replies[1].recipient, Recipient::AdminBroadcast);
        assert!(replies[1].text.contains("corrupt"));
    }

    #[tokio::test]
    async fn group_free_text_is_ignored() {
        let dir = tempdir().unwrap();
        let state = AppState::new(StateStore::new(dir.path()));
        let msg = Inbound { user_id: 9, chat_id: -100, text: "hello".into(), is_private: false };
        let replies = handle_message(&state, &cfg(), &ExactJudge, &msg).await;
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn wizard_swallows_commands_as_literal_content() {
        let dir = tempdir().unwrap();
        let state = AppState::new(StateStore::new(dir.path()));
        say(&state, 1, "/new_quiz Q3").await;
        say(&state, 1, "/quiz flavored title").await;
        let wizards = state.wizards.read().await;
        assert_eq!(wizards.get(&1).unwrap().title, "/quiz flavored title");
    }
}
