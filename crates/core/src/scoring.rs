use crate::model::{
    Answer, AnswerSheet, ItemScore, Outcome, Requirement, RequirementScore, RequirementSpec,
    SessionResult, TaskItem,
};

//
// ─── SCORING RULES ─────────────────────────────────────────────────────────────
//

/// Score one requirement against the learner's answer.
///
/// Total over all inputs: missing answers, answers of the wrong shape,
/// unparsable numbers and out-of-range option indexes are all `Incorrect`.
/// Journal entries and written responses are always `Ungraded`.
///
/// # Examples
///
/// ```
/// # use tbs_core::model::{Answer, Outcome, Requirement, RequirementSpec};
/// # use tbs_core::scoring::score_requirement;
/// let req = Requirement::new(
///     "r1",
///     "Compute interest expense",
///     RequirementSpec::Calculation { correct_answer: 1000.0, tolerance: 5.0, explanation: None },
/// );
/// let answer = Answer::Calculation("1005".into());
/// assert_eq!(score_requirement(&req, Some(&answer)), Outcome::Correct);
/// assert_eq!(score_requirement(&req, None), Outcome::Incorrect);
/// ```
#[must_use]
pub fn score_requirement(requirement: &Requirement, answer: Option<&Answer>) -> Outcome {
    match &requirement.spec {
        RequirementSpec::MultipleChoice { correct_answer, .. } => {
            score_multiple_choice(*correct_answer, answer)
        }
        RequirementSpec::Calculation {
            correct_answer,
            tolerance,
            ..
        } => score_calculation(*correct_answer, *tolerance, answer),
        RequirementSpec::JournalEntry { .. } | RequirementSpec::WrittenResponse { .. } => {
            Outcome::Ungraded
        }
    }
}

fn score_multiple_choice(correct_answer: usize, answer: Option<&Answer>) -> Outcome {
    match answer {
        Some(Answer::MultipleChoice(selected)) if *selected == correct_answer => Outcome::Correct,
        _ => Outcome::Incorrect,
    }
}

fn score_calculation(correct_answer: f64, tolerance: f64, answer: Option<&Answer>) -> Outcome {
    let Some(Answer::Calculation(raw)) = answer else {
        return Outcome::Incorrect;
    };
    let Some(value) = coerce_number(raw) else {
        return Outcome::Incorrect;
    };
    let tolerance = if tolerance.is_finite() && tolerance > 0.0 {
        tolerance
    } else {
        0.0
    };
    if (value - correct_answer).abs() <= tolerance {
        Outcome::Correct
    } else {
        Outcome::Incorrect
    }
}

/// Parse submitted text as a finite number.
///
/// Returns `None` for empty input, `NaN`, infinities and anything unparsable.
#[must_use]
pub fn coerce_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

//
// ─── AGGREGATION ───────────────────────────────────────────────────────────────
//

/// Score every requirement of every item and total the scoreable ones.
///
/// Pure; safe to call repeatedly for review re-renders. When nothing is
/// scoreable the percentage is `0`.
#[must_use]
pub fn aggregate(items: &[TaskItem], answers: &AnswerSheet) -> SessionResult {
    let mut total_points = 0_u32;
    let mut earned_points = 0_u32;
    let mut scores = Vec::with_capacity(items.len());

    for item in items {
        let mut item_total = 0_u32;
        let mut item_earned = 0_u32;
        let mut requirements = Vec::with_capacity(item.requirements().len());

        for requirement in item.requirements() {
            let outcome = score_requirement(requirement, answers.get(item.id(), &requirement.id));
            if requirement.is_scoreable() {
                item_total = item_total.saturating_add(1);
                if outcome.is_correct() {
                    item_earned = item_earned.saturating_add(1);
                }
            }
            requirements.push(RequirementScore {
                requirement_id: requirement.id.clone(),
                kind: requirement.kind(),
                outcome,
            });
        }

        total_points = total_points.saturating_add(item_total);
        earned_points = earned_points.saturating_add(item_earned);
        scores.push(ItemScore {
            item_id: item.id().clone(),
            earned_points: item_earned,
            total_points: item_total,
            requirements,
        });
    }

    SessionResult {
        total_points,
        earned_points,
        score_percent: score_percent(earned_points, total_points),
        items: scores,
    }
}

/// `round(earned / total * 100)`, or `0` when `total` is zero.
#[must_use]
pub fn score_percent(earned: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let earned = u64::from(earned.min(total));
    let total = u64::from(total);
    // Integer half-up rounding of earned * 100 / total.
    let percent = (earned * 200 + total) / (total * 2);
    u32::try_from(percent).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnswerKey, JournalLine, RequirementId, RubricCriterion, TaskItemDraft, TaskItemId,
    };

    fn mc(id: &str, correct: usize) -> Requirement {
        Requirement::new(
            id,
            "Choose",
            RequirementSpec::MultipleChoice {
                options: vec!["A".into(), "B".into(), "C".into()],
                correct_answer: correct,
                explanation: None,
            },
        )
    }

    fn calc(id: &str, correct: f64, tolerance: f64) -> Requirement {
        Requirement::new(
            id,
            "Compute",
            RequirementSpec::Calculation {
                correct_answer: correct,
                tolerance,
                explanation: Some("Face value times rate".into()),
            },
        )
    }

    fn journal(id: &str) -> Requirement {
        Requirement::new(
            id,
            "Record the entry",
            RequirementSpec::JournalEntry {
                template: vec![JournalLine::default(); 2],
                correct_entries: vec![
                    JournalLine::debit("Cash", 500.0),
                    JournalLine::credit("Revenue", 500.0),
                ],
            },
        )
    }

    fn written(id: &str) -> Requirement {
        Requirement::new(
            id,
            "Draft a memo",
            RequirementSpec::WrittenResponse {
                rubric: vec![RubricCriterion {
                    criterion: "Cites guidance".into(),
                    weight: 2,
                }],
                sample_response: Some("Per ASC 606...".into()),
            },
        )
    }

    fn item(id: &str, requirements: Vec<Requirement>) -> TaskItem {
        TaskItemDraft {
            id: TaskItemId::new(id),
            title: format!("Item {id}"),
            scenario: String::new(),
            time_estimate_minutes: None,
            requirements,
            hints: Vec::new(),
            references: Vec::new(),
        }
        .validate()
        .unwrap()
    }

    fn answer(sheet: &mut AnswerSheet, item: &str, req: &str, value: Answer) {
        sheet.record(
            AnswerKey::new(TaskItemId::new(item), RequirementId::new(req)),
            value,
        );
    }

    #[test]
    fn multiple_choice_matches_exact_index_only() {
        let req = mc("r", 1);
        assert_eq!(
            score_requirement(&req, Some(&Answer::MultipleChoice(1))),
            Outcome::Correct
        );
        assert_eq!(
            score_requirement(&req, Some(&Answer::MultipleChoice(0))),
            Outcome::Incorrect
        );
        assert_eq!(
            score_requirement(&req, Some(&Answer::MultipleChoice(99))),
            Outcome::Incorrect
        );
        assert_eq!(score_requirement(&req, None), Outcome::Incorrect);
    }

    #[test]
    fn wrong_answer_shape_is_incorrect() {
        assert_eq!(
            score_requirement(&mc("r", 1), Some(&Answer::Calculation("1".into()))),
            Outcome::Incorrect
        );
        assert_eq!(
            score_requirement(&calc("c", 1.0, 0.0), Some(&Answer::MultipleChoice(1))),
            Outcome::Incorrect
        );
    }

    #[test]
    fn calculation_tolerance_boundary_is_inclusive() {
        let req = calc("c", 1000.0, 5.0);
        let at = |raw: &str| score_requirement(&req, Some(&Answer::Calculation(raw.into())));

        assert_eq!(at("1005"), Outcome::Correct);
        assert_eq!(at("995"), Outcome::Correct);
        assert_eq!(at("1006"), Outcome::Incorrect);
        assert_eq!(at("994"), Outcome::Incorrect);
    }

    #[test]
    fn calculation_defaults_to_exact_match() {
        let req = calc("c", 0.3, 0.0);
        assert_eq!(
            score_requirement(&req, Some(&Answer::Calculation("0.3".into()))),
            Outcome::Correct
        );
        assert_eq!(
            score_requirement(&req, Some(&Answer::calculation(0.1 + 0.2))),
            Outcome::Incorrect
        );
        assert_eq!(
            score_requirement(&req, Some(&Answer::Calculation("0.31".into()))),
            Outcome::Incorrect
        );
    }

    #[test]
    fn zero_tolerance_rejects_tiny_differences() {
        let req = calc("c", 1000.0, 0.0);
        assert_eq!(
            score_requirement(&req, Some(&Answer::Calculation("1000.0000000005".into()))),
            Outcome::Incorrect
        );
        assert_eq!(
            score_requirement(&req, Some(&Answer::Calculation("1000".into()))),
            Outcome::Correct
        );
    }

    #[test]
    fn calculation_rejects_non_numeric_input() {
        let req = calc("c", 0.0, 1.0);
        for raw in ["", "   ", "abc", "NaN", "inf", "1,000"] {
            assert_eq!(
                score_requirement(&req, Some(&Answer::Calculation(raw.into()))),
                Outcome::Incorrect,
                "input {raw:?}"
            );
        }
    }

    #[test]
    fn calculation_trims_whitespace() {
        let req = calc("c", 42.0, 0.0);
        assert_eq!(
            score_requirement(&req, Some(&Answer::Calculation(" 42 ".into()))),
            Outcome::Correct
        );
    }

    #[test]
    fn journal_and_written_are_ungraded() {
        let entries = Answer::JournalEntry(vec![JournalLine::debit("Cash", 500.0)]);
        assert_eq!(
            score_requirement(&journal("j"), Some(&entries)),
            Outcome::Ungraded
        );
        assert_eq!(score_requirement(&written("w"), None), Outcome::Ungraded);
    }

    #[test]
    fn aggregate_two_multiple_choice_half_correct() {
        let items = vec![item("i1", vec![mc("r1", 1), mc("r2", 0)])];
        let mut sheet = AnswerSheet::new();
        answer(&mut sheet, "i1", "r1", Answer::MultipleChoice(1));
        answer(&mut sheet, "i1", "r2", Answer::MultipleChoice(1));

        let result = aggregate(&items, &sheet);
        assert_eq!(result.earned_points, 1);
        assert_eq!(result.total_points, 2);
        assert_eq!(result.score_percent, 50);
    }

    #[test]
    fn aggregate_excludes_journal_and_written_from_totals() {
        let items = vec![
            item("i1", vec![journal("j1"), mc("m1", 0), written("w1")]),
            item("i2", vec![calc("c1", 10.0, 0.0), journal("j2")]),
        ];
        let mut sheet = AnswerSheet::new();
        answer(&mut sheet, "i1", "m1", Answer::MultipleChoice(0));
        answer(&mut sheet, "i2", "c1", Answer::Calculation("10".into()));

        let result = aggregate(&items, &sheet);
        assert_eq!(result.total_points, 2);
        assert_eq!(result.earned_points, 2);
        assert_eq!(result.score_percent, 100);

        let first = result.item(&TaskItemId::new("i1")).unwrap();
        assert_eq!((first.earned_points, first.total_points), (1, 1));
        assert_eq!(first.requirements.len(), 3);
        assert_eq!(first.requirements[0].outcome, Outcome::Ungraded);
    }

    #[test]
    fn aggregate_written_only_session_scores_zero() {
        let items = vec![item("i1", vec![written("w1")])];
        let result = aggregate(&items, &AnswerSheet::new());

        assert_eq!(result.total_points, 0);
        assert_eq!(result.score_percent, 0);
        assert!(!result.is_graded());
    }

    #[test]
    fn aggregate_is_repeatable() {
        let items = vec![item("i1", vec![mc("r1", 2), calc("c1", 5.0, 0.5)])];
        let mut sheet = AnswerSheet::new();
        answer(&mut sheet, "i1", "r1", Answer::MultipleChoice(2));

        assert_eq!(aggregate(&items, &sheet), aggregate(&items, &sheet));
    }

    #[test]
    fn score_percent_rounds_half_up() {
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(0, 0), 0);
        assert_eq!(score_percent(5, 5), 100);
    }
}
