//! Core data model.
//!
//! A work item is a unit of operational work on a site (task, incident,
//! observation, service request, approval, custody transfer). It has identity,
//! classification, lifecycle status, and exclusively owns its comments,
//! subtasks, and approval chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of operational work tracked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique identifier. Assigned at creation, immutable.
    pub id: ItemId,

    /// What kind of work this is. Payload-carrying kinds keep their
    /// type-specific fields here so illegal combinations can't exist.
    pub kind: ItemKind,

    /// Urgency. Critical items get an SLA due date via automation.
    pub priority: Priority,

    /// Current lifecycle status.
    pub status: Status,

    pub title: String,
    pub description: String,

    /// Free-form labels. Order is not significant.
    pub tags: Vec<String>,

    /// Weak reference to a project. Lookup only, never owning.
    pub project_id: Option<String>,

    /// Weak reference to the assigned user.
    pub assignee_id: Option<String>,

    /// Weak reference to the creating user. None means the item was
    /// submitted anonymously; creator-directed notifications are skipped.
    pub creator_id: Option<String>,

    /// Append-only comment log. System-authored entries record automation.
    pub comments: Vec<Comment>,

    /// Independently togglable checklist, in insertion order.
    pub subtasks: Vec<Subtask>,

    /// Ordered approval steps. Empty means no approval gate.
    pub approval_chain: Vec<ApprovalStep>,

    pub due_date: DateTime<Utc>,

    /// Immutable creation timestamp.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    /// First step in chain order whose decision is still Pending.
    /// Pre-resolved earlier steps are skipped.
    pub fn first_pending_step(&self) -> Option<&ApprovalStep> {
        self.approval_chain
            .iter()
            .find(|s| s.decision == Decision::Pending)
    }

    /// Does this item have a step the given user can act on right now?
    ///
    /// A step is actionable iff it is Pending, addressed to the user, and the
    /// item is not frozen by a rejection.
    pub fn has_actionable_step_for(&self, user_id: &str) -> bool {
        self.status != Status::Rejected
            && self
                .approval_chain
                .iter()
                .any(|s| s.decision == Decision::Pending && s.approver_id == user_id)
    }

    /// Reset every step of the chain back to Pending, clearing decision
    /// comments and dates. The only chain-wide reset operation.
    pub fn reset_approval_chain(&mut self) {
        for step in &mut self.approval_chain {
            step.reset();
        }
    }
}

/// Newtype for work item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Work item classification. The payload variants carry the fields that only
/// make sense for that kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Task,
    Incident,
    Observation,
    ServiceRequest {
        service_type: String,
        department: String,
    },
    Approval,
    Custody {
        asset_id: String,
        employee_id: String,
    },
}

impl ItemKind {
    /// Kinds that route to the safety supervisor when the safety rule is on.
    pub fn is_safety_sensitive(&self) -> bool {
        matches!(self, ItemKind::Incident | ItemKind::Observation)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Task => "task",
            ItemKind::Incident => "incident",
            ItemKind::Observation => "observation",
            ItemKind::ServiceRequest { .. } => "service_request",
            ItemKind::Approval => "approval",
            ItemKind::Custody { .. } => "custody",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Created, not yet picked up.
    Open,
    /// Being worked.
    InProgress,
    /// Waiting on an approval chain.
    PendingApproval,
    /// Chain fully approved. Distinct from Done; completion is explicit.
    Approved,
    /// Chain rejected. Frozen until resubmitted.
    Rejected,
    /// Finished. Terminal.
    Done,
}

impl Status {
    /// Can transition from self to `to`?
    ///
    /// Movement among the non-terminal trio is free (the generic update
    /// surface allows it); chain decisions may land Approved/Rejected from
    /// any non-terminal status. Self-transitions are idempotent writes.
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        if self == to {
            return true;
        }
        matches!(
            (self, to),
            (Open, InProgress)
                | (Open, PendingApproval)
                | (Open, Approved)
                | (Open, Rejected)
                | (Open, Done)
                | (InProgress, Open)
                | (InProgress, PendingApproval)
                | (InProgress, Approved)
                | (InProgress, Rejected)
                | (InProgress, Done)
                | (PendingApproval, Open)
                | (PendingApproval, InProgress)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Approved, Done)
                | (Rejected, PendingApproval) // resubmit
        )
    }

    /// Is this a terminal status? Approved and Rejected are near-terminal:
    /// Approved can still complete, Rejected can still resubmit.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::PendingApproval => "pending_approval",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
            Status::Done => "done",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Comments & Subtasks
// ---------------------------------------------------------------------------

/// One entry in the append-only comment log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    /// None for system-authored entries and anonymous commenters.
    pub author_id: Option<String>,
    pub body: String,
    /// True when written by the automation engine rather than a person.
    pub system: bool,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(author_id: Option<String>, body: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            body: body.into(),
            system: false,
            created_at: at,
        }
    }

    /// A comment authored by the automation engine.
    pub fn system(body: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id: None,
            body: body.into(),
            system: true,
            created_at: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub title: String,
    pub done: bool,
}

impl Subtask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            done: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Approval chain
// ---------------------------------------------------------------------------

/// One stage in an approval chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: Uuid,
    /// Role label, e.g. "Site Manager".
    pub role: String,
    pub approver_name: String,
    /// Weak reference to the approving user.
    pub approver_id: String,
    pub decision: Decision,
    /// Free text. Required when the decision is Rejected.
    pub comments: Option<String>,
    /// Set exactly when the decision leaves Pending.
    pub decision_date: Option<DateTime<Utc>>,
}

impl ApprovalStep {
    pub fn new(
        role: impl Into<String>,
        approver_name: impl Into<String>,
        approver_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: role.into(),
            approver_name: approver_name.into(),
            approver_id: approver_id.into(),
            decision: Decision::Pending,
            comments: None,
            decision_date: None,
        }
    }

    /// Back to Pending, decision comments and date cleared.
    pub fn reset(&mut self) {
        self.decision = Decision::Pending;
        self.comments = None;
        self.decision_date = None;
    }
}

/// Per-step decision. Pending is the initial value; a step transitions
/// away from it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Decision::Pending => "pending",
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// Chain-level result, when the chain has reached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    Approved,
    Rejected,
}

/// Derive the chain-level outcome from the current step decisions.
///
/// Any rejected step rejects the chain; remaining Pending steps are left
/// untouched (the chain is frozen, not auto-rejected). A non-empty chain
/// with every step approved is approved. Anything else has no outcome yet
/// and leaves the parent status unchanged.
pub fn chain_outcome(steps: &[ApprovalStep]) -> Option<ChainOutcome> {
    if steps.iter().any(|s| s.decision == Decision::Rejected) {
        return Some(ChainOutcome::Rejected);
    }
    if !steps.is_empty() && steps.iter().all(|s| s.decision == Decision::Approved) {
        return Some(ChainOutcome::Approved);
    }
    None
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for creating work items. The engine's public API for submission.
pub struct NewWorkItem {
    pub(crate) kind: ItemKind,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) priority: Priority,
    pub(crate) status: Option<Status>,
    pub(crate) tags: Vec<String>,
    pub(crate) project_id: Option<String>,
    pub(crate) assignee_id: Option<String>,
    pub(crate) creator_id: Option<String>,
    pub(crate) subtasks: Vec<Subtask>,
    pub(crate) approval_chain: Vec<ApprovalStep>,
    pub(crate) due_date: Option<DateTime<Utc>>,
}

impl NewWorkItem {
    pub fn new(kind: ItemKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: String::new(),
            priority: Priority::Medium,
            status: None,
            tags: Vec::new(),
            project_id: None,
            assignee_id: None,
            creator_id: None,
            subtasks: Vec::new(),
            approval_chain: Vec::new(),
            due_date: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Caller-supplied initial status. Defaults to Open.
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn assignee(mut self, assignee_id: impl Into<String>) -> Self {
        self.assignee_id = Some(assignee_id.into());
        self
    }

    pub fn creator(mut self, creator_id: impl Into<String>) -> Self {
        self.creator_id = Some(creator_id.into());
        self
    }

    pub fn subtask(mut self, subtask: Subtask) -> Self {
        self.subtasks.push(subtask);
        self
    }

    pub fn approval_step(mut self, step: ApprovalStep) -> Self {
        self.approval_chain.push(step);
        self
    }

    /// Explicit due date. Defaults to creation time + 24h; the critical-SLA
    /// automation rule may overwrite either.
    pub fn due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// Partial mutation for the generic update operation. `None` leaves a field
/// alone; the double-Option fields distinguish "clear" from "leave alone".
#[derive(Debug, Clone, Default)]
pub struct WorkItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub tags: Option<Vec<String>>,
    pub assignee_id: Option<Option<String>>,
    pub project_id: Option<Option<String>>,
    pub subtasks: Option<Vec<Subtask>>,
    pub approval_chain: Option<Vec<ApprovalStep>>,
    pub due_date: Option<DateTime<Utc>>,
}
