use std::collections::{HashMap, HashSet};

use crate::models::attempt::SubmittedAnswer;
use crate::models::course::{Correctness, Question, QuestionKind};

/// Outcome of grading one submitted answer. `is_correct` is None for open
/// responses, which are recorded but left to an out-of-band grader.
#[derive(Debug, Clone)]
pub struct GradedAnswer {
    pub question_id: String,
    pub selected_item_ids: Vec<String>,
    pub response_content: Option<String>,
    pub is_correct: Option<bool>,
}

#[derive(Debug)]
pub struct GradingOutcome {
    pub answers: Vec<GradedAnswer>,
    pub correct_count: u32,
    pub total_questions: u32,
    /// round(100 * correct / total), always in 0..=100.
    pub score: u32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GradingError {
    #[error("quiz has no questions")]
    NoQuestions,
    #[error("no answers submitted")]
    NoAnswers,
    #[error("unknown question: {0}")]
    UnknownQuestion(String),
    #[error("duplicate answer for question: {0}")]
    DuplicateAnswer(String),
}

/// Grade a full submission against the quiz's question definitions.
///
/// Choice questions are correct iff the selected item-id set exactly equals
/// the set of items marked Correct (order-independent); selecting nothing is
/// always incorrect. Open responses count toward the total but never toward
/// the correct count. Questions left unanswered count as incorrect. At most
/// one answer per question: a repeated question id rejects the whole
/// submission so it cannot inflate the correct count.
pub fn grade_submission(
    questions: &[Question],
    answers: &[SubmittedAnswer],
) -> Result<GradingOutcome, GradingError> {
    if questions.is_empty() {
        return Err(GradingError::NoQuestions);
    }
    if answers.is_empty() {
        return Err(GradingError::NoAnswers);
    }

    let by_id: HashMap<&str, &Question> =
        questions.iter().map(|q| (q.id.as_str(), q)).collect();

    let mut graded = Vec::with_capacity(answers.len());
    let mut answered: HashSet<&str> = HashSet::with_capacity(answers.len());
    let mut correct_count = 0u32;

    for answer in answers {
        let question = by_id
            .get(answer.question_id.as_str())
            .copied()
            .ok_or_else(|| GradingError::UnknownQuestion(answer.question_id.clone()))?;

        if !answered.insert(answer.question_id.as_str()) {
            return Err(GradingError::DuplicateAnswer(answer.question_id.clone()));
        }

        let is_correct = match question.kind {
            QuestionKind::Mcq | QuestionKind::UniqueChoice => {
                Some(is_choice_correct(question, &answer.question_item_ids))
            }
            QuestionKind::OpenResponse => None,
        };

        if is_correct == Some(true) {
            correct_count += 1;
        }

        graded.push(GradedAnswer {
            question_id: answer.question_id.clone(),
            selected_item_ids: answer.question_item_ids.clone(),
            response_content: answer.response_content.clone(),
            is_correct,
        });
    }

    let total_questions = questions.len() as u32;
    let score = percentage(correct_count, total_questions);

    Ok(GradingOutcome {
        answers: graded,
        correct_count,
        total_questions,
        score,
    })
}

fn is_choice_correct(question: &Question, selected: &[String]) -> bool {
    if selected.is_empty() {
        return false;
    }

    let expected: HashSet<&str> = question
        .items
        .iter()
        .filter(|item| item.correctness == Correctness::Correct)
        .map(|item| item.id.as_str())
        .collect();

    let chosen: HashSet<&str> = selected.iter().map(|s| s.as_str()).collect();

    !expected.is_empty() && chosen == expected
}

/// Pass decision for a graded attempt: meeting the quiz threshold exactly
/// passes.
pub fn meets_threshold(score: u32, success_percentage: u32) -> bool {
    score >= success_percentage
}

/// round(100 * part / whole); 0 when whole is 0 so callers can reuse it for
/// enrollment aggregation over empty courses.
pub fn percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((100.0 * f64::from(part) / f64::from(whole)).round() as u32).min(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::course::QuestionItem;

    fn item(id: &str, correctness: Correctness) -> QuestionItem {
        QuestionItem {
            id: id.to_string(),
            content: format!("option {}", id),
            correctness,
            right_response: None,
        }
    }

    fn mcq(id: &str, rank: u32, items: Vec<QuestionItem>) -> Question {
        Question {
            id: id.to_string(),
            kind: QuestionKind::Mcq,
            prompt: format!("question {}", id),
            rank,
            items,
        }
    }

    fn answer(question_id: &str, item_ids: &[&str]) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id: question_id.to_string(),
            question_item_ids: item_ids.iter().map(|s| s.to_string()).collect(),
            response_content: None,
        }
    }

    #[test]
    fn exact_set_equality_is_required() {
        let q = mcq(
            "q1",
            1,
            vec![
                item("a", Correctness::Correct),
                item("b", Correctness::Correct),
                item("c", Correctness::Incorrect),
            ],
        );

        assert!(is_choice_correct(&q, &["b".into(), "a".into()]));
        assert!(!is_choice_correct(&q, &["a".into()]));
        assert!(!is_choice_correct(&q, &["a".into(), "b".into(), "c".into()]));
        assert!(!is_choice_correct(&q, &[]));
    }

    #[test]
    fn question_without_right_items_is_never_correct() {
        let q = mcq("q1", 1, vec![item("a", Correctness::Incorrect)]);
        assert!(!is_choice_correct(&q, &["a".into()]));
    }

    #[test]
    fn two_of_three_rounds_to_67() {
        let questions = vec![
            mcq("q1", 1, vec![item("a", Correctness::Correct)]),
            mcq("q2", 2, vec![item("b", Correctness::Correct)]),
            mcq("q3", 3, vec![item("c", Correctness::Correct)]),
        ];
        let answers = vec![
            answer("q1", &["a"]),
            answer("q2", &["b"]),
            answer("q3", &["wrong"]),
        ];

        let outcome = grade_submission(&questions, &answers).unwrap();
        assert_eq!(outcome.correct_count, 2);
        assert_eq!(outcome.score, 67);
    }

    #[test]
    fn open_responses_are_recorded_but_not_scored() {
        let questions = vec![
            mcq("q1", 1, vec![item("a", Correctness::Correct)]),
            Question {
                id: "q2".to_string(),
                kind: QuestionKind::OpenResponse,
                prompt: "explain".to_string(),
                rank: 2,
                items: vec![QuestionItem {
                    id: "model".to_string(),
                    content: "model answer".to_string(),
                    correctness: Correctness::NotApplicable,
                    right_response: Some("because".to_string()),
                }],
            },
        ];
        let answers = vec![
            answer("q1", &["a"]),
            SubmittedAnswer {
                question_id: "q2".to_string(),
                question_item_ids: vec![],
                response_content: Some("my essay".to_string()),
            },
        ];

        let outcome = grade_submission(&questions, &answers).unwrap();
        assert_eq!(outcome.correct_count, 1);
        assert_eq!(outcome.score, 50);
        assert_eq!(outcome.answers[1].is_correct, None);
        assert_eq!(
            outcome.answers[1].response_content.as_deref(),
            Some("my essay")
        );
    }

    #[test]
    fn empty_quiz_is_rejected_not_divided() {
        let err = grade_submission(&[], &[answer("q1", &["a"])]).unwrap_err();
        assert_eq!(err, GradingError::NoQuestions);
    }

    #[test]
    fn empty_answers_are_rejected() {
        let questions = vec![mcq("q1", 1, vec![item("a", Correctness::Correct)])];
        let err = grade_submission(&questions, &[]).unwrap_err();
        assert_eq!(err, GradingError::NoAnswers);
    }

    #[test]
    fn repeated_answers_for_one_question_are_rejected() {
        let questions = vec![
            mcq("q1", 1, vec![item("a", Correctness::Correct)]),
            mcq("q2", 2, vec![item("b", Correctness::Correct)]),
            mcq("q3", 3, vec![item("c", Correctness::Correct)]),
        ];
        // Repeating the one known-correct answer must not yield 3/3.
        let answers = vec![
            answer("q1", &["a"]),
            answer("q1", &["a"]),
            answer("q1", &["a"]),
        ];

        let err = grade_submission(&questions, &answers).unwrap_err();
        assert_eq!(err, GradingError::DuplicateAnswer("q1".to_string()));
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        assert!(meets_threshold(70, 70));
        assert!(!meets_threshold(69, 70));
        assert!(meets_threshold(100, 100));
        assert!(meets_threshold(0, 0));
    }

    #[test]
    fn unknown_question_is_rejected() {
        let questions = vec![mcq("q1", 1, vec![item("a", Correctness::Correct)])];
        let err = grade_submission(&questions, &[answer("nope", &["a"])]).unwrap_err();
        assert_eq!(err, GradingError::UnknownQuestion("nope".to_string()));
    }

    #[test]
    fn unanswered_questions_count_as_incorrect() {
        let questions = vec![
            mcq("q1", 1, vec![item("a", Correctness::Correct)]),
            mcq("q2", 2, vec![item("b", Correctness::Correct)]),
        ];
        let outcome = grade_submission(&questions, &[answer("q1", &["a"])]).unwrap();
        assert_eq!(outcome.correct_count, 1);
        assert_eq!(outcome.total_questions, 2);
        assert_eq!(outcome.score, 50);
    }

    #[test]
    fn percentage_bounds() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(0, 4), 0);
        assert_eq!(percentage(2, 4), 50);
        assert_eq!(percentage(4, 4), 100);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 3), 33);
    }
}
