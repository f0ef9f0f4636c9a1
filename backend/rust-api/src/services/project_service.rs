use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, Database};
use uuid::Uuid;

use crate::error::{is_duplicate_key, ApiError};
use crate::metrics::CHAPTERS_COMPLETED_TOTAL;
use crate::models::enrollment::EnrollmentStatus;
use crate::models::event::{DomainEvent, DomainEventKind, EventStatus};
use crate::models::progress::ProgressStatus;
use crate::models::project::{
    Project, ProjectEnrollment, Ticket, TicketProgress, TicketWithLockStatus,
};
use crate::services::grading::percentage;
use crate::models::to_bson_datetime;

/// Mini-project track: structural mirror of enrollments/chapter progress
/// over (project, ticket), with an independent lifecycle. Tickets carry no
/// quiz, so the unlock rule is completion of the previous ticket alone.
pub struct ProjectService {
    mongo: Database,
}

impl ProjectService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn enroll(
        &self,
        student_id: &str,
        project_id: &str,
    ) -> Result<ProjectEnrollment, ApiError> {
        let project = self
            .mongo
            .collection::<Project>("projects")
            .find_one(doc! { "_id": project_id, "published": true })
            .await
            .context("Failed to query projects collection")?
            .ok_or_else(|| ApiError::not_found(format!("Project {} not found", project_id)))?;

        let enrollment = ProjectEnrollment {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            project_id: project.id.clone(),
            status: EnrollmentStatus::Active,
            progress_percentage: 0,
            enrolled_at: Utc::now(),
            completed_at: None,
        };

        let collection = self
            .mongo
            .collection::<ProjectEnrollment>("project_enrollments");
        match collection.insert_one(&enrollment).await {
            Ok(_) => Ok(enrollment),
            Err(e) if is_duplicate_key(&e) => Err(ApiError::conflict(format!(
                "Student already enrolled in project {}",
                project_id
            ))),
            Err(e) => Err(ApiError::Internal(anyhow::Error::new(e))),
        }
    }

    /// Idempotent first-view create, mirroring chapter start.
    pub async fn start_ticket(
        &self,
        student_id: &str,
        ticket_id: &str,
    ) -> Result<TicketProgress, ApiError> {
        self.load_ticket(ticket_id).await?;

        let collection = self.mongo.collection::<TicketProgress>("ticket_progress");
        if let Some(existing) = collection
            .find_one(doc! { "student_id": student_id, "ticket_id": ticket_id })
            .await
            .context("Failed to query ticket progress")?
        {
            return Ok(existing);
        }

        let progress = TicketProgress {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            ticket_id: ticket_id.to_string(),
            status: ProgressStatus::InProgress,
            progress_percentage: 0,
            started_at: Utc::now(),
            completed_at: None,
        };

        match collection.insert_one(&progress).await {
            Ok(_) => Ok(progress),
            Err(e) if is_duplicate_key(&e) => collection
                .find_one(doc! { "student_id": student_id, "ticket_id": ticket_id })
                .await
                .context("Failed to re-read ticket progress after conflict")?
                .ok_or_else(|| ApiError::conflict("Ticket progress vanished after conflict")),
            Err(e) => Err(ApiError::Internal(anyhow::Error::new(e))),
        }
    }

    /// First call completes the ticket and emits the event; completed_at is
    /// immutable thereafter.
    pub async fn complete_ticket(
        &self,
        student_id: &str,
        ticket_id: &str,
    ) -> Result<TicketProgress, ApiError> {
        let ticket = self.load_ticket(ticket_id).await?;
        let collection = self.mongo.collection::<TicketProgress>("ticket_progress");

        let existing = collection
            .find_one(doc! { "student_id": student_id, "ticket_id": ticket_id })
            .await
            .context("Failed to query ticket progress")?;

        if let Some(row) = &existing {
            if row.status == ProgressStatus::Completed {
                return Ok(row.clone());
            }
        }

        let now = Utc::now();
        let completed = match existing {
            Some(row) => {
                collection
                    .update_one(
                        doc! { "_id": &row.id, "status": { "$ne": "completed" } },
                        doc! { "$set": {
                            "status": "completed",
                            "progress_percentage": 100,
                            "completed_at": to_bson_datetime(now),
                        }},
                    )
                    .await
                    .context("Failed to complete ticket progress")?;

                collection
                    .find_one(doc! { "_id": &row.id })
                    .await
                    .context("Failed to re-read ticket progress")?
                    .ok_or_else(|| ApiError::not_found("Ticket progress not found"))?
            }
            None => {
                let row = TicketProgress {
                    id: Uuid::new_v4().to_string(),
                    student_id: student_id.to_string(),
                    ticket_id: ticket_id.to_string(),
                    status: ProgressStatus::Completed,
                    progress_percentage: 100,
                    started_at: now,
                    completed_at: Some(now),
                };
                match collection.insert_one(&row).await {
                    Ok(_) => row,
                    Err(e) if is_duplicate_key(&e) => collection
                        .find_one(doc! { "student_id": student_id, "ticket_id": ticket_id })
                        .await
                        .context("Failed to re-read ticket progress after conflict")?
                        .ok_or_else(|| {
                            ApiError::conflict("Ticket progress vanished after conflict")
                        })?,
                    Err(e) => return Err(ApiError::Internal(anyhow::Error::new(e))),
                }
            }
        };

        CHAPTERS_COMPLETED_TOTAL
            .with_label_values(&["ticket"])
            .inc();

        self.enqueue_event(
            student_id,
            DomainEventKind::TicketCompleted {
                ticket_id: ticket_id.to_string(),
                project_id: ticket.project_id.clone(),
            },
        )
        .await;

        Ok(completed)
    }

    /// Tickets of a project with the derived lock view: ticket N+1 unlocks
    /// when ticket N is completed; the first is never locked.
    pub async fn tickets_with_lock_status(
        &self,
        student_id: &str,
        project_id: &str,
    ) -> Result<Vec<TicketWithLockStatus>, ApiError> {
        let tickets = self.load_project_tickets(project_id).await?;
        if tickets.is_empty() {
            return Err(ApiError::not_found(format!(
                "Project {} has no tickets",
                project_id
            )));
        }

        let ticket_ids: Vec<&str> = tickets.iter().map(|t| t.id.as_str()).collect();
        let progress = self.load_progress_map(student_id, &ticket_ids).await?;

        let mut out = Vec::with_capacity(tickets.len());
        let mut prev_completed = true; // first ticket is never locked
        for ticket in tickets {
            let status = progress.get(&ticket.id).copied();
            let locked = !prev_completed;
            prev_completed = status == Some(ProgressStatus::Completed);
            out.push(TicketWithLockStatus {
                id: ticket.id,
                project_id: ticket.project_id,
                title: ticket.title,
                order: ticket.order,
                locked,
                progress_status: status,
            });
        }
        Ok(out)
    }

    /// Mirror of the enrollment recompute over completed tickets.
    pub async fn recompute_project_progress(
        &self,
        student_id: &str,
        project_id: &str,
    ) -> Result<Option<ProjectEnrollment>, ApiError> {
        let collection = self
            .mongo
            .collection::<ProjectEnrollment>("project_enrollments");
        let enrollment = collection
            .find_one(doc! { "student_id": student_id, "project_id": project_id })
            .await
            .context("Failed to query project enrollment")?;

        let Some(enrollment) = enrollment else {
            tracing::warn!(
                "No project enrollment for student={}, project={}; skipping recompute",
                student_id,
                project_id
            );
            return Ok(None);
        };

        let tickets = self.load_project_tickets(project_id).await?;
        let ticket_ids: Vec<String> = tickets.into_iter().map(|t| t.id).collect();
        let total = ticket_ids.len() as u32;

        let completed = self
            .mongo
            .collection::<TicketProgress>("ticket_progress")
            .count_documents(doc! {
                "student_id": student_id,
                "ticket_id": { "$in": &ticket_ids },
                "status": "completed",
            })
            .await
            .context("Failed to count completed tickets")? as u32;

        let pct = percentage(completed, total);
        let now = Utc::now();

        let mut update = doc! { "progress_percentage": pct };
        let newly_completed = pct == 100 && enrollment.status != EnrollmentStatus::Completed;
        if newly_completed {
            update.insert("status", "completed");
            if enrollment.completed_at.is_none() {
                update.insert("completed_at", to_bson_datetime(now));
            }
        }

        collection
            .update_one(doc! { "_id": &enrollment.id }, doc! { "$set": update })
            .await
            .context("Failed to update project enrollment")?;

        if newly_completed {
            self.enqueue_event(
                student_id,
                DomainEventKind::ProjectCompleted {
                    project_id: project_id.to_string(),
                },
            )
            .await;
        }

        collection
            .find_one(doc! { "_id": &enrollment.id })
            .await
            .context("Failed to re-read project enrollment")
            .map_err(ApiError::from)
    }

    async fn load_ticket(&self, ticket_id: &str) -> Result<Ticket, ApiError> {
        self.mongo
            .collection::<Ticket>("tickets")
            .find_one(doc! { "_id": ticket_id })
            .await
            .context("Failed to query tickets collection")?
            .ok_or_else(|| ApiError::not_found(format!("Ticket {} not found", ticket_id)))
    }

    async fn load_project_tickets(&self, project_id: &str) -> Result<Vec<Ticket>, ApiError> {
        let collection = self.mongo.collection::<Ticket>("tickets");
        let options = FindOptions::builder().sort(doc! { "order": 1 }).build();

        let mut cursor = collection
            .find(doc! { "project_id": project_id })
            .with_options(options)
            .await
            .context("Failed to query tickets")?;

        let mut tickets = Vec::new();
        while let Some(ticket) = cursor.try_next().await.context("Ticket cursor error")? {
            tickets.push(ticket);
        }
        Ok(tickets)
    }

    async fn load_progress_map(
        &self,
        student_id: &str,
        ticket_ids: &[&str],
    ) -> Result<HashMap<String, ProgressStatus>, ApiError> {
        let collection = self.mongo.collection::<TicketProgress>("ticket_progress");
        let mut cursor = collection
            .find(doc! {
                "student_id": student_id,
                "ticket_id": { "$in": ticket_ids.to_vec() },
            })
            .await
            .context("Failed to query ticket progress rows")?;

        let mut map = HashMap::new();
        while let Some(row) = cursor
            .try_next()
            .await
            .context("Ticket progress cursor error")?
        {
            map.insert(row.ticket_id, row.status);
        }
        Ok(map)
    }

    async fn enqueue_event(&self, student_id: &str, kind: DomainEventKind) {
        let collection = self.mongo.collection::<DomainEvent>("domain_events");
        let event = DomainEvent {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            kind,
            status: EventStatus::Pending,
            created_at: Utc::now(),
            attempts: 0,
        };

        if let Err(e) = collection.insert_one(&event).await {
            tracing::error!("Failed to enqueue domain event: {:#}", e);
        }
    }
}
