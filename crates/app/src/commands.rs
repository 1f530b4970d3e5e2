use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use services::{
    Clock, SessionPhase, SimulationLoopService, SimulationSession, Selector, StudyHistoryService,
};
use storage::repository::{QuestionBank, Storage, StudyProgressRepository};
use tbs_core::model::{
    Answer, JournalLine, Outcome, ReferenceAnswer, RequirementId, SessionResult, TaskItem,
    TaskItemId,
};
use tbs_core::time::format_countdown;
use tracing::{info, warn};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// One line of an answers file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct AnswerEntry {
    item_id: TaskItemId,
    requirement_id: RequirementId,
    answer: Answer,
}

fn parse_task_items(raw: &str) -> Result<Vec<TaskItem>, serde_json::Error> {
    serde_json::from_str(raw)
}

fn parse_answers(raw: &str) -> Result<Vec<AnswerEntry>, serde_json::Error> {
    serde_json::from_str(raw)
}

pub async fn seed(storage: &Storage, area: &str, file: &Path) -> CommandResult {
    let raw = std::fs::read_to_string(file)?;
    let items = parse_task_items(&raw)?;
    for item in &items {
        storage.question_bank.upsert_task_item(area, item).await?;
    }
    info!(area, count = items.len(), "task items seeded");
    println!("Seeded {} task item(s) into {area}.", items.len());
    Ok(())
}

pub async fn areas(storage: &Storage) -> CommandResult {
    let areas = storage.question_bank.list_areas().await?;
    if areas.is_empty() {
        println!("No subject areas seeded yet.");
    }
    for area in areas {
        println!("{area}");
    }
    Ok(())
}

pub async fn history(storage: &Storage, limit: u32) -> CommandResult {
    let items = StudyHistoryService::new(Arc::clone(&storage.progress))
        .list_recent(limit)
        .await?;
    if items.is_empty() {
        println!("No completed sessions yet.");
    }
    for item in items {
        println!(
            "{}  {:<12} {:>3}%  {}/{} pts  {} min",
            item.completed_at.format("%Y-%m-%d %H:%M"),
            item.label,
            item.score_percent,
            item.earned_points,
            item.total_points,
            item.elapsed_minutes,
        );
    }
    Ok(())
}

pub async fn practice(
    storage: &Storage,
    area: &str,
    answers: Option<&Path>,
    max_items: usize,
) -> CommandResult {
    let entries = match answers {
        Some(path) => parse_answers(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let service = SimulationLoopService::new(
        Clock::default_clock(),
        Arc::clone(&storage.question_bank),
        Arc::clone(&storage.progress),
    )
    .with_selector(Selector::new(max_items));

    let mut session = service.start_session(area).await?;
    if session.phase() == SessionPhase::Unavailable {
        println!("No task items available for {area}.");
        return Ok(());
    }

    apply_answers(&mut session, entries);
    let outcome = service.submit(&mut session)?;
    let report = render_report(&session, &outcome.result)?;
    service.flush_pending().await;

    print!("{report}");
    Ok(())
}

/// Record answers that match the selected items; the rest are skipped.
fn apply_answers(session: &mut SimulationSession, entries: Vec<AnswerEntry>) -> usize {
    let mut applied = 0;
    for entry in entries {
        match session.record_answer(&entry.item_id, &entry.requirement_id, entry.answer) {
            Ok(_) => applied += 1,
            Err(err) => warn!(
                item = %entry.item_id,
                requirement = %entry.requirement_id,
                error = %err,
                "answer skipped"
            ),
        }
    }
    applied
}

fn render_report(
    session: &SimulationSession,
    result: &SessionResult,
) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "TBS: {}", session.area())?;
    if result.is_graded() {
        writeln!(
            out,
            "Score: {}% ({}/{} points)",
            result.score_percent, result.earned_points, result.total_points
        )?;
    } else {
        writeln!(out, "Score: not graded (no auto-scored requirements)")?;
    }
    writeln!(
        out,
        "Time remaining: {}",
        format_countdown(session.remaining_seconds())
    )?;

    let Some(reviews) = session.review() else {
        return Ok(out);
    };
    for (index, review) in reviews.iter().enumerate() {
        writeln!(out)?;
        writeln!(
            out,
            "[{}] {} ({}/{})",
            index + 1,
            review.item.title(),
            review.earned_points,
            review.total_points
        )?;
        for requirement in &review.requirements {
            writeln!(
                out,
                "  {} [{}] {}",
                requirement.requirement.id,
                requirement.requirement.kind().as_str(),
                outcome_label(requirement.outcome)
            )?;
            writeln!(
                out,
                "    yours:    {}",
                requirement
                    .answer
                    .map_or_else(|| "(unanswered)".to_owned(), describe_answer)
            )?;
            writeln!(
                out,
                "    expected: {}",
                describe_reference(&requirement.reference)
            )?;
        }
    }
    Ok(out)
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Correct => "correct",
        Outcome::Incorrect => "incorrect",
        Outcome::Ungraded => "self-assess",
    }
}

fn describe_line(line: &JournalLine) -> String {
    match (line.debit, line.credit) {
        (Some(debit), _) => format!("Dr {} {debit}", line.account),
        (None, Some(credit)) => format!("Cr {} {credit}", line.account),
        (None, None) => line.account.clone(),
    }
}

fn describe_lines(lines: &[JournalLine]) -> String {
    lines
        .iter()
        .filter(|line| !line.is_blank())
        .map(describe_line)
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_answer(answer: &Answer) -> String {
    match answer {
        Answer::JournalEntry(lines) => describe_lines(lines),
        Answer::Calculation(raw) => raw.trim().to_owned(),
        Answer::MultipleChoice(index) => format!("option {index}"),
        Answer::WrittenResponse(text) => text.clone(),
    }
}

fn describe_reference(reference: &ReferenceAnswer<'_>) -> String {
    match reference {
        ReferenceAnswer::JournalEntry { correct_entries } => describe_lines(correct_entries),
        ReferenceAnswer::Calculation {
            correct_answer,
            tolerance,
            ..
        } if *tolerance > 0.0 => format!("{correct_answer} (within {tolerance})"),
        ReferenceAnswer::Calculation { correct_answer, .. } => correct_answer.to_string(),
        ReferenceAnswer::MultipleChoice {
            correct_index,
            correct_option: Some(option),
            ..
        } => format!("option {correct_index}: {option}"),
        ReferenceAnswer::MultipleChoice { correct_index, .. } => format!("option {correct_index}"),
        ReferenceAnswer::WrittenResponse {
            sample_response, ..
        } => sample_response
            .unwrap_or("compare against the rubric")
            .to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use services::Selection;
    use tbs_core::time::fixed_now;

    const ITEMS: &str = r#"[
        {
            "id": "leases-1",
            "title": "Lease classification",
            "scenario": "A five-year equipment lease.",
            "time_estimate_minutes": 12,
            "requirements": [
                {"id": "pv", "prompt": "Present value?", "type": "calculation",
                 "correct_answer": 4329.48, "tolerance": 0.5},
                {"id": "kind", "prompt": "Classification?", "type": "multiple_choice",
                 "options": ["Operating", "Finance"], "correct_answer": 1},
                {"id": "entry", "prompt": "Initial entry", "type": "journal_entry",
                 "correct_entries": [{"account": "ROU asset", "debit": 4329.48},
                                     {"account": "Lease liability", "credit": 4329.48}]}
            ]
        }
    ]"#;

    const ANSWERS: &str = r#"[
        {"item_id": "leases-1", "requirement_id": "pv",
         "answer": {"type": "calculation", "value": "4329.9"}},
        {"item_id": "leases-1", "requirement_id": "kind",
         "answer": {"type": "multiple_choice", "value": 0}},
        {"item_id": "missing", "requirement_id": "pv",
         "answer": {"type": "calculation", "value": "1"}}
    ]"#;

    fn session() -> SimulationSession {
        let items = parse_task_items(ITEMS).unwrap();
        SimulationSession::start("FAR", Selection::from_items(items), fixed_now())
    }

    #[test]
    fn answers_outside_the_session_are_skipped() {
        let mut session = session();
        let applied = apply_answers(&mut session, parse_answers(ANSWERS).unwrap());
        assert_eq!(applied, 2);
        assert_eq!(session.answers().len(), 2);
    }

    #[test]
    fn report_lists_outcomes_and_references() {
        let mut session = session();
        apply_answers(&mut session, parse_answers(ANSWERS).unwrap());
        let result = session.submit(fixed_now()).unwrap().result;

        let report = render_report(&session, &result).unwrap();

        assert!(report.starts_with("TBS: FAR\nScore: 50% (1/2 points)\n"));
        assert!(report.contains("Time remaining: 12:00"));
        assert!(report.contains("pv [calculation] correct"));
        assert!(report.contains("kind [multiple_choice] incorrect"));
        assert!(report.contains("expected: option 1: Finance"));
        assert!(report.contains("entry [journal_entry] self-assess"));
        assert!(report.contains("yours:    (unanswered)"));
        assert!(report.contains("Dr ROU asset 4329.48; Cr Lease liability 4329.48"));
    }

    #[test]
    fn invalid_items_file_is_rejected() {
        let raw = r#"[{"id": "x", "title": "Empty", "requirements": []}]"#;
        assert!(parse_task_items(raw).is_err());
    }

    #[tokio::test]
    async fn seeded_items_can_be_practiced() {
        let storage = Storage::in_memory();
        for item in parse_task_items(ITEMS).unwrap() {
            storage
                .question_bank
                .upsert_task_item("FAR", &item)
                .await
                .unwrap();
        }

        practice(&storage, "FAR", None, 6).await.unwrap();

        let recent = storage.progress.list_recent(5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].session.score_percent(), 0);
        assert_eq!(recent[0].session.total_points(), 2);
    }
}
