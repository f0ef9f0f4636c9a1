use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, Database};
use uuid::Uuid;

use crate::error::{is_duplicate_key, ApiError};
use crate::metrics::ATTEMPTS_GRADED_TOTAL;
use crate::models::attempt::{
    AttemptStatus, AttemptSummary, QuestionResponse, QuizAttempt, SubmitAttemptRequest,
    SubmitAttemptResponse,
};
use crate::models::course::Quiz;
use crate::models::event::{DomainEvent, DomainEventKind, EventStatus};
use crate::services::grading::{self, GradingError};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// How many times attempt-number allocation retries after losing the race
/// to a concurrent submission for the same (student, quiz).
const ATTEMPT_ALLOC_RETRIES: u32 = 3;

pub struct AttemptService {
    mongo: Database,
}

impl AttemptService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Grade a submission and persist the attempt, its responses, and the
    /// outbox event. The attempt write is the commit point; everything
    /// downstream is best-effort and never rolls it back.
    pub async fn submit_attempt(
        &self,
        student_id: &str,
        quiz_id: &str,
        req: &SubmitAttemptRequest,
    ) -> Result<SubmitAttemptResponse, ApiError> {
        tracing::info!(
            "Grading attempt: student={}, quiz={}, answers={}",
            student_id,
            quiz_id,
            req.answers.len()
        );

        let quiz = self.load_quiz(quiz_id).await?;

        let outcome = grading::grade_submission(&quiz.questions, &req.answers).map_err(|e| {
            match e {
                GradingError::UnknownQuestion(_)
                | GradingError::DuplicateAnswer(_)
                | GradingError::NoAnswers => ApiError::validation(e.to_string()),
                GradingError::NoQuestions => {
                    ApiError::validation(format!("Quiz {} has no questions", quiz_id))
                }
            }
        })?;

        let status = if grading::meets_threshold(outcome.score, quiz.success_percentage) {
            AttemptStatus::Passed
        } else {
            AttemptStatus::Failed
        };

        let attempt = self
            .insert_attempt(student_id, quiz_id, req, outcome.score, status)
            .await?;

        // One response row per submitted answer. A single failed insert is
        // logged and skipped; it must not fail the graded attempt.
        self.save_responses(&attempt.id, &outcome.answers).await;

        self.enqueue_graded_event(&attempt, outcome.score, status == AttemptStatus::Passed)
            .await;

        let status_label = match status {
            AttemptStatus::Passed => "passed",
            AttemptStatus::Failed => "failed",
            AttemptStatus::InProgress => "in_progress",
        };
        ATTEMPTS_GRADED_TOTAL
            .with_label_values(&[status_label])
            .inc();

        tracing::info!(
            "Attempt graded: student={}, quiz={}, attempt_number={}, score={}, status={}",
            student_id,
            quiz_id,
            attempt.attempt_number,
            outcome.score,
            status_label
        );

        Ok(SubmitAttemptResponse {
            attempt_id: attempt.id,
            attempt_number: attempt.attempt_number,
            status,
            score: outcome.score,
            correct_count: outcome.correct_count,
            total_questions: outcome.total_questions,
        })
    }

    /// The caller's attempts for one quiz, newest first.
    pub async fn list_attempts(
        &self,
        student_id: &str,
        quiz_id: &str,
    ) -> Result<Vec<AttemptSummary>, ApiError> {
        let collection = self.mongo.collection::<QuizAttempt>("quiz_attempts");
        let options = FindOptions::builder()
            .sort(doc! { "attempt_number": -1 })
            .build();

        let mut cursor = collection
            .find(doc! { "student_id": student_id, "quiz_id": quiz_id })
            .with_options(options)
            .await
            .context("Failed to query quiz attempts")?;

        let mut attempts = Vec::new();
        while let Some(attempt) = cursor
            .try_next()
            .await
            .context("Attempt cursor error")?
        {
            attempts.push(AttemptSummary::from(attempt));
        }
        Ok(attempts)
    }

    async fn load_quiz(&self, quiz_id: &str) -> Result<Quiz, ApiError> {
        let collection = self.mongo.collection::<Quiz>("quizzes");
        collection
            .find_one(doc! { "_id": quiz_id })
            .await
            .context("Failed to query quizzes collection")?
            .ok_or_else(|| ApiError::not_found(format!("Quiz {} not found", quiz_id)))
    }

    /// Allocate attempt_number = 1 + prior count and insert. Two concurrent
    /// submissions can read the same count; the unique index on
    /// (student_id, quiz_id, attempt_number) rejects the loser, which
    /// recounts and retries.
    async fn insert_attempt(
        &self,
        student_id: &str,
        quiz_id: &str,
        req: &SubmitAttemptRequest,
        score: u32,
        status: AttemptStatus,
    ) -> Result<QuizAttempt, ApiError> {
        let collection = self.mongo.collection::<QuizAttempt>("quiz_attempts");

        let mut last_err: Option<mongodb::error::Error> = None;
        for _ in 0..=ATTEMPT_ALLOC_RETRIES {
            let prior = collection
                .count_documents(doc! { "student_id": student_id, "quiz_id": quiz_id })
                .await
                .context("Failed to count prior attempts")?;

            let attempt = QuizAttempt {
                id: Uuid::new_v4().to_string(),
                student_id: student_id.to_string(),
                quiz_id: quiz_id.to_string(),
                attempt_number: prior as u32 + 1,
                status,
                score: Some(score),
                time_spent_seconds: req.time_spent_seconds,
                chapter_progress_id: req.chapter_progress_id.clone(),
                submitted_at: Utc::now(),
            };

            match collection.insert_one(&attempt).await {
                Ok(_) => return Ok(attempt),
                Err(e) if is_duplicate_key(&e) => {
                    tracing::warn!(
                        "attempt_number {} already taken for student={}, quiz={}; recounting",
                        attempt.attempt_number,
                        student_id,
                        quiz_id
                    );
                    last_err = Some(e);
                }
                Err(e) => return Err(ApiError::Internal(anyhow::Error::new(e))),
            }
        }

        Err(ApiError::conflict(format!(
            "Could not allocate attempt number for quiz {}: {}",
            quiz_id,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn save_responses(&self, attempt_id: &str, answers: &[grading::GradedAnswer]) {
        let collection = self
            .mongo
            .collection::<QuestionResponse>("question_responses");

        for answer in answers {
            let response = QuestionResponse {
                id: Uuid::new_v4().to_string(),
                attempt_id: attempt_id.to_string(),
                question_id: answer.question_id.clone(),
                selected_item_ids: answer.selected_item_ids.clone(),
                response_content: answer.response_content.clone(),
                is_correct: answer.is_correct,
            };

            let res = retry_async_with_config(RetryConfig::default(), || async {
                collection.insert_one(&response).await.map(|_| ())
            })
            .await;

            if let Err(e) = res {
                tracing::error!(
                    "Failed to save response for attempt={}, question={}: {:#}",
                    attempt_id,
                    answer.question_id,
                    e
                );
            }
        }
    }

    /// Outbox append; the attempt is already committed, so a failure here is
    /// logged and the worker simply never sees the event.
    async fn enqueue_graded_event(&self, attempt: &QuizAttempt, score: u32, passed: bool) {
        let collection = self.mongo.collection::<DomainEvent>("domain_events");
        let event = DomainEvent {
            id: Uuid::new_v4().to_string(),
            student_id: attempt.student_id.clone(),
            kind: DomainEventKind::QuizGraded {
                quiz_id: attempt.quiz_id.clone(),
                attempt_id: attempt.id.clone(),
                score,
                passed,
                chapter_progress_id: attempt.chapter_progress_id.clone(),
            },
            status: EventStatus::Pending,
            created_at: Utc::now(),
            attempts: 0,
        };

        let res = retry_async_with_config(RetryConfig::aggressive(), || async {
            collection.insert_one(&event).await.map(|_| ())
        })
        .await;

        if let Err(e) = res {
            tracing::error!(
                "Failed to enqueue quiz_graded event for attempt={}: {:#}",
                attempt.id,
                e
            );
        }
    }
}
