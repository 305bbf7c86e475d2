//! Core engine. The public API for creating and managing work items.
//!
//! The engine owns the storage and composes the automation rule engine, the
//! approval-chain state machine, and notification emission. All mutations go
//! through here: persist first, then emit notifications. Notification
//! emission is fire-and-forget; it can never fail a workflow operation.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::automation::{self, AutomationRule};
use crate::error::{Error, Result};
use crate::model::*;
use crate::notify::{NewNotification, Notification};
use crate::storage::Storage;

/// The workflow engine. Owns all state and enforces all invariants.
pub struct Engine {
    storage: Storage,
}

impl Engine {
    /// Create an engine with in-memory storage (for testing).
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            storage: Storage::in_memory()?,
        })
    }

    /// Create an engine backed by a file.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self {
            storage: Storage::open(path)?,
        })
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create a work item from a draft.
    ///
    /// Assigns id and timestamps, fills defaults (status Open, due date
    /// 24h out), runs the enabled automation rules against the draft and
    /// appends each applied action as a system comment, persists, then
    /// emits notifications: "assigned" to the assignee when one is set and
    /// differs from the creator, and "approval required" to the approver of
    /// the first step in chain order still Pending.
    pub fn create(&mut self, new: NewWorkItem) -> Result<WorkItem> {
        let now = Utc::now();

        let item = WorkItem {
            id: ItemId::new(),
            kind: new.kind,
            priority: new.priority,
            status: new.status.unwrap_or(Status::Open),
            title: new.title,
            description: new.description,
            tags: new.tags,
            project_id: new.project_id,
            assignee_id: new.assignee_id,
            creator_id: new.creator_id,
            comments: Vec::new(),
            subtasks: new.subtasks,
            approval_chain: new.approval_chain,
            due_date: new.due_date.unwrap_or(now + Duration::hours(24)),
            created_at: now,
            updated_at: now,
        };

        let rules = self.storage.list_rules()?;
        let (mut item, log) = automation::apply_rules(item, &rules);
        for line in log {
            item.comments.push(Comment::system(line, now));
        }

        self.storage.insert_work_item(&item)?;

        if let Some(assignee) = item.assignee_id.clone() {
            if item.creator_id.as_deref() != Some(assignee.as_str()) {
                self.emit(NewNotification::assigned(&assignee, item.id, &item.title));
            }
        }
        if let Some(approver) = item.first_pending_step().map(|s| s.approver_id.clone()) {
            self.emit(NewNotification::approval_required(
                &approver, item.id, &item.title,
            ));
        }

        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Get a work item by ID.
    pub fn get(&self, id: ItemId) -> Result<WorkItem> {
        self.storage.get_work_item(id)
    }

    /// List all work items, newest first.
    pub fn list(&self) -> Result<Vec<WorkItem>> {
        self.storage.list_work_items()
    }

    /// List work items by status.
    pub fn list_by_status(&self, status: Status) -> Result<Vec<WorkItem>> {
        self.storage.list_by_status(status)
    }

    /// Items with a step the given user can act on: the step is Pending,
    /// addressed to them, and the item is not frozen by a rejection.
    pub fn pending_approvals_for(&self, user_id: &str) -> Result<Vec<WorkItem>> {
        let items = self.storage.list_work_items()?;
        Ok(items
            .into_iter()
            .filter(|item| item.has_actionable_step_for(user_id))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Move a work item to a new status.
    ///
    /// Validates the transition, persists, then notifies the creator
    /// (skipped for anonymous submissions).
    pub fn update_status(&mut self, id: ItemId, new_status: Status) -> Result<WorkItem> {
        let mut item = self.storage.get_work_item(id)?;

        if !item.status.can_transition_to(new_status) {
            return Err(Error::InvalidTransition {
                from: item.status,
                to: new_status,
            });
        }

        item.status = new_status;
        item.updated_at = Utc::now();
        self.storage.update_work_item(&item)?;

        if let Some(creator) = item.creator_id.clone() {
            self.emit(NewNotification::status_changed(
                &creator, item.id, &item.title, new_status,
            ));
        }

        Ok(item)
    }

    /// Generic partial mutation: field edits, subtask replacement, chain
    /// edits. Triggers no automation and no notifications; callers making
    /// semantically significant changes own any follow-up themselves.
    pub fn update(&mut self, id: ItemId, patch: WorkItemPatch) -> Result<WorkItem> {
        let mut item = self.storage.get_work_item(id)?;

        if let Some(status) = patch.status {
            if !item.status.can_transition_to(status) {
                return Err(Error::InvalidTransition {
                    from: item.status,
                    to: status,
                });
            }
            item.status = status;
        }
        if let Some(title) = patch.title {
            item.title = title;
        }
        if let Some(description) = patch.description {
            item.description = description;
        }
        if let Some(priority) = patch.priority {
            item.priority = priority;
        }
        if let Some(tags) = patch.tags {
            item.tags = tags;
        }
        if let Some(assignee_id) = patch.assignee_id {
            item.assignee_id = assignee_id;
        }
        if let Some(project_id) = patch.project_id {
            item.project_id = project_id;
        }
        if let Some(subtasks) = patch.subtasks {
            item.subtasks = subtasks;
        }
        if let Some(approval_chain) = patch.approval_chain {
            item.approval_chain = approval_chain;
        }
        if let Some(due_date) = patch.due_date {
            item.due_date = due_date;
        }

        item.updated_at = Utc::now();
        self.storage.update_work_item(&item)?;
        Ok(item)
    }

    /// Toggle one subtask's completion flag.
    pub fn set_subtask_done(&mut self, id: ItemId, subtask_id: Uuid, done: bool) -> Result<WorkItem> {
        let mut item = self.storage.get_work_item(id)?;

        let subtask = item
            .subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or_else(|| Error::NotFound(format!("subtask {subtask_id}")))?;
        subtask.done = done;

        item.updated_at = Utc::now();
        self.storage.update_work_item(&item)?;
        Ok(item)
    }

    /// Append a comment.
    ///
    /// Notifies the assignee and the creator, skipping the comment's own
    /// author and never notifying the same user twice.
    pub fn add_comment(
        &mut self,
        id: ItemId,
        author_id: Option<&str>,
        body: impl Into<String>,
    ) -> Result<WorkItem> {
        let now = Utc::now();
        let mut item = self.storage.get_work_item(id)?;

        item.comments
            .push(Comment::new(author_id.map(str::to_string), body, now));
        item.updated_at = now;
        self.storage.update_work_item(&item)?;

        let assignee = item
            .assignee_id
            .clone()
            .filter(|a| Some(a.as_str()) != author_id);
        let creator = item
            .creator_id
            .clone()
            .filter(|c| Some(c.as_str()) != author_id)
            .filter(|c| Some(c) != assignee.as_ref());

        if let Some(assignee) = assignee {
            self.emit(NewNotification::new_comment(&assignee, item.id, &item.title));
        }
        if let Some(creator) = creator {
            self.emit(NewNotification::new_comment(&creator, item.id, &item.title));
        }

        Ok(item)
    }

    /// Record an approval decision on one step.
    ///
    /// A step decides exactly once; rejections require a reason; a rejected
    /// item's chain is frozen until resubmitted. The step update and the
    /// derived item status land in a single row write, then the creator is
    /// notified of the decision.
    pub fn submit_decision(
        &mut self,
        id: ItemId,
        step_id: Uuid,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<WorkItem> {
        if decision == Decision::Pending {
            return Err(Error::Validation(
                "a decision must be approved or rejected".to_string(),
            ));
        }
        let reason = comments.filter(|c| !c.trim().is_empty());
        if decision == Decision::Rejected && reason.is_none() {
            return Err(Error::Validation(
                "a rejection requires a reason".to_string(),
            ));
        }

        let now = Utc::now();
        let mut item = self.storage.get_work_item(id)?;

        if item.status == Status::Rejected {
            return Err(Error::Validation(
                "chain is frozen until the item is resubmitted".to_string(),
            ));
        }

        let step = item
            .approval_chain
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or_else(|| Error::NotFound(format!("approval step {step_id}")))?;
        if step.decision != Decision::Pending {
            return Err(Error::Validation(format!(
                "step already decided: {}",
                step.decision
            )));
        }

        step.decision = decision;
        step.comments = reason;
        step.decision_date = Some(now);
        let role = step.role.clone();

        match chain_outcome(&item.approval_chain) {
            Some(ChainOutcome::Approved) => item.status = Status::Approved,
            Some(ChainOutcome::Rejected) => item.status = Status::Rejected,
            None => {} // chain still in flight, parent status unchanged
        }

        item.updated_at = now;
        self.storage.update_work_item(&item)?;

        if let Some(creator) = item.creator_id.clone() {
            self.emit(NewNotification::decision(
                &creator,
                item.id,
                &item.title,
                decision == Decision::Approved,
                &role,
            ));
        }

        Ok(item)
    }

    /// Resubmit a rejected item: every step back to Pending with decision
    /// comments and dates cleared, status back to PendingApproval, and the
    /// first approver notified again.
    pub fn resubmit(&mut self, id: ItemId) -> Result<WorkItem> {
        let mut item = self.storage.get_work_item(id)?;

        if item.approval_chain.is_empty() {
            return Err(Error::Validation(
                "item has no approval chain".to_string(),
            ));
        }
        if item.status != Status::Rejected {
            return Err(Error::Validation(format!(
                "only rejected items can be resubmitted, status is {}",
                item.status
            )));
        }

        item.reset_approval_chain();
        item.status = Status::PendingApproval;
        item.updated_at = Utc::now();
        self.storage.update_work_item(&item)?;

        if let Some(approver) = item.first_pending_step().map(|s| s.approver_id.clone()) {
            self.emit(NewNotification::approval_required(
                &approver, item.id, &item.title,
            ));
        }

        Ok(item)
    }

    /// The explicit completion action.
    ///
    /// Chain-less items complete from Open/InProgress; items with a chain
    /// only once the approval path has reached Approved.
    pub fn complete(&mut self, id: ItemId) -> Result<WorkItem> {
        let item = self.storage.get_work_item(id)?;

        if !item.approval_chain.is_empty() && item.status != Status::Approved {
            return Err(Error::Validation(
                "approval chain must be approved before completion".to_string(),
            ));
        }

        self.update_status(id, Status::Done)
    }

    // -----------------------------------------------------------------------
    // Automation rule configuration
    // -----------------------------------------------------------------------

    /// The current rule configuration.
    pub fn rules(&self) -> Result<Vec<AutomationRule>> {
        self.storage.list_rules()
    }

    /// Enable or disable a rule. Takes effect for subsequent creations.
    pub fn set_rule_enabled(&mut self, rule_id: &str, enabled: bool) -> Result<AutomationRule> {
        self.storage.set_rule_enabled(rule_id, enabled)
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Notifications addressed to a user, newest first.
    pub fn inbox(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.storage.list_notifications_for(user_id)
    }

    /// Mark one notification as read.
    pub fn mark_notification_read(&mut self, notification_id: Uuid) -> Result<()> {
        self.storage.mark_notification_read(notification_id)
    }

    /// Persist a notification, swallowing failure. Emission must never fail
    /// the workflow operation that triggered it.
    fn emit(&mut self, notification: NewNotification) {
        if let Err(e) = self.storage.insert_notification(notification) {
            tracing::warn!(error = %e, "failed to emit notification");
        }
    }
}
