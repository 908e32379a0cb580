//! Read-only statistics over the progress collection.
//!
//! No caching: reports are recomputed from the full collections on every
//! invocation (sizes are bounded by course enrollment). Empty populations
//! report "no data" rather than NaN.

use std::collections::BTreeSet;

use crate::domain::{ProgressStatus, Quiz, QuizProgress};

/// Per-student `/quiz_stat` view: one line per visible quiz.
pub fn student_report(quizzes: &[Quiz], progress: &[QuizProgress], user_id: i64) -> String {
    let visible: Vec<&Quiz> = quizzes.iter().filter(|q| !q.hidden).collect();
    if visible.is_empty() {
        return "There are no quizzes yet.".into();
    }

    let mut lines = vec!["Your quiz progress:".to_string()];
    for quiz in visible {
        let record = progress
            .iter()
            .find(|p| p.user_id == user_id && p.quiz_id == quiz.id);
        let status = record.map(|p| p.status).unwrap_or(ProgressStatus::NotStarted);
        let attempts = record.map(|p| p.total_attempts()).unwrap_or(0);
        let marker = match status {
            ProgressStatus::Passed => "✅",
            ProgressStatus::FailedExhausted => "❌",
            ProgressStatus::InProgress => "⏳",
            ProgressStatus::NotStarted => "⚪",
        };
        lines.push(format!("- {marker} {}: {} (attempts: {attempts})", quiz.id, quiz.title));
    }
    lines.join("\n")
}

/// Admin `/quiz_admin_stat` view: per-quiz status counts and mean/std of
/// total attempts among students who passed. Hidden quizzes are included
/// and flagged.
pub fn admin_report(quizzes: &[Quiz], progress: &[QuizProgress]) -> String {
    if quizzes.is_empty() {
        return "There are no quizzes yet.".into();
    }

    let students: BTreeSet<i64> = progress.iter().map(|p| p.user_id).collect();
    if students.is_empty() {
        return "No student data yet.".into();
    }

    let visible_ids: Vec<&str> = quizzes.iter().filter(|q| !q.hidden).map(|q| q.id.as_str()).collect();
    let mut passed_any = 0usize;
    let mut passed_all = 0usize;
    for &uid in &students {
        let passed = |qid: &str| {
            progress
                .iter()
                .any(|p| p.user_id == uid && p.quiz_id == qid && p.status == ProgressStatus::Passed)
        };
        if visible_ids.iter().any(|qid| passed(qid)) {
            passed_any += 1;
        }
        if !visible_ids.is_empty() && visible_ids.iter().all(|qid| passed(qid)) {
            passed_all += 1;
        }
    }

    let mut lines = vec![
        "Quiz statistics (by student):".to_string(),
        format!("- students tracked: {}", students.len()),
        format!("- passed at least one quiz: {passed_any}"),
        format!("- passed all quizzes: {passed_all}"),
        String::new(),
        "Per quiz (mean/std of attempts among passers):".to_string(),
    ];

    for quiz in quizzes {
        let records: Vec<&QuizProgress> =
            progress.iter().filter(|p| p.quiz_id == quiz.id).collect();
        let count = |s: ProgressStatus| records.iter().filter(|p| p.status == s).count();
        let passed_attempts: Vec<u32> = records
            .iter()
            .filter(|p| p.status == ProgressStatus::Passed)
            .map(|p| p.total_attempts())
            .collect();

        let prefix = if quiz.hidden { "🙈 " } else { "" };
        let spread = match mean_std(&passed_attempts) {
            Some((mean, std)) => format!("mean={mean:.2}, std={std:.2}"),
            None => "no data".to_string(),
        };
        lines.push(format!(
            "- {prefix}{}: passed={}, failed={}, in_progress={}, {spread}",
            quiz.id,
            count(ProgressStatus::Passed),
            count(ProgressStatus::FailedExhausted),
            count(ProgressStatus::InProgress),
        ));
    }
    lines.join("\n")
}

/// Population mean and standard deviation; None on an empty slice.
pub(crate) fn mean_std(values: &[u32]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some((mean, var.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Question;
    use chrono::Utc;

    fn quiz(id: &str, hidden: bool) -> Quiz {
        Quiz {
            id: id.into(),
            title: format!("Quiz {id}"),
            hidden,
            questions: vec![Question { prompt: "p".into(), expected: "a".into() }],
        }
    }

    fn record(user: i64, qid: &str, status: ProgressStatus, attempts: u32) -> QuizProgress {
        let now = Utc::now();
        QuizProgress {
            user_id: user,
            quiz_id: qid.into(),
            status,
            current_index: if status == ProgressStatus::Passed { 1 } else { 0 },
            attempts: vec![attempts],
            started_at: now,
            updated_at: now,
            score: status.is_terminal().then_some(if status == ProgressStatus::Passed { 1 } else { 0 }),
        }
    }

    #[test]
    fn mean_std_over_passers_only() {
        let quizzes = vec![quiz("q1", false)];
        let progress = vec![
            record(1, "q1", ProgressStatus::Passed, 1),
            record(2, "q1", ProgressStatus::Passed, 3),
            record(3, "q1", ProgressStatus::FailedExhausted, 3),
        ];
        let report = admin_report(&quizzes, &progress);
        // mean of {1, 3} = 2, population std = 1.
        assert!(report.contains("mean=2.00, std=1.00"), "{report}");
        assert!(report.contains("passed=2, failed=1, in_progress=0"));
    }

    #[test]
    fn empty_population_reports_no_data() {
        let quizzes = vec![quiz("q1", false)];
        let progress = vec![record(3, "q1", ProgressStatus::FailedExhausted, 3)];
        let report = admin_report(&quizzes, &progress);
        assert!(report.contains("no data"), "{report}");
        assert!(!report.contains("NaN"));
    }

    #[test]
    fn mean_std_empty_is_none() {
        assert_eq!(mean_std(&[]), None);
        assert_eq!(mean_std(&[4]), Some((4.0, 0.0)));
    }

    #[test]
    fn passed_all_counts_only_visible_quizzes() {
        let quizzes = vec![quiz("q1", false), quiz("secret", true)];
        let progress = vec![record(1, "q1", ProgressStatus::Passed, 2)];
        let report = admin_report(&quizzes, &progress);
        assert!(report.contains("passed all quizzes: 1"), "{report}");
        assert!(report.contains("🙈 secret"));
    }

    #[test]
    fn student_report_marks_each_status() {
        let quizzes = vec![quiz("q1", false), quiz("q2", false), quiz("q3", false), quiz("hid", true)];
        let progress = vec![
            record(1, "q1", ProgressStatus::Passed, 2),
            record(1, "q2", ProgressStatus::InProgress, 1),
        ];
        let report = student_report(&quizzes, &progress, 1);
        assert!(report.contains("✅ q1"));
        assert!(report.contains("⏳ q2"));
        assert!(report.contains("⚪ q3"));
        assert!(!report.contains("hid"));
    }
}
