//! Integration tests for the workflow engine.

use chrono::{Duration, Utc};
use siteops::automation::{RULE_CRITICAL_SLA, RULE_SAFETY_ROUTING, SAFETY_SUPERVISOR_ID};
use siteops::engine::Engine;
use siteops::error::Error;
use siteops::model::*;

fn test_engine() -> Engine {
    Engine::in_memory().expect("failed to create in-memory engine")
}

// ---------------------------------------------------------------------------
// Creation defaults
// ---------------------------------------------------------------------------

#[test]
fn create_fills_defaults() {
    let mut engine = test_engine();

    let before = Utc::now();
    let item = engine
        .create(NewWorkItem::new(ItemKind::Task, "Pour foundation").creator("user-ray"))
        .unwrap();

    assert_eq!(item.status, Status::Open);
    assert!(item.comments.is_empty());
    assert!(item.subtasks.is_empty());
    assert!(item.approval_chain.is_empty());
    assert!(item.tags.is_empty());
    assert_eq!(item.priority, Priority::Medium);

    // due date defaults to creation + 24h
    let expected = item.created_at + Duration::hours(24);
    assert_eq!(item.due_date, expected);
    assert!(item.created_at >= before);

    // and the item is persisted
    let loaded = engine.get(item.id).unwrap();
    assert_eq!(loaded, item);
}

#[test]
fn create_respects_caller_supplied_fields() {
    let mut engine = test_engine();

    let due = Utc::now() + Duration::days(7);
    let item = engine
        .create(
            NewWorkItem::new(ItemKind::Task, "Order rebar")
                .status(Status::InProgress)
                .priority(Priority::High)
                .due_date(due)
                .tag("procurement")
                .project("project-7"),
        )
        .unwrap();

    assert_eq!(item.status, Status::InProgress);
    assert_eq!(item.priority, Priority::High);
    assert_eq!(item.due_date, due);
    assert_eq!(item.tags, vec!["procurement".to_string()]);
    assert_eq!(item.project_id.as_deref(), Some("project-7"));
}

// ---------------------------------------------------------------------------
// Automation at creation
// ---------------------------------------------------------------------------

#[test]
fn critical_incident_gets_routed_and_sla_with_two_system_comments() {
    let mut engine = test_engine();

    let item = engine
        .create(
            NewWorkItem::new(ItemKind::Incident, "Crane contact with power line")
                .priority(Priority::Critical)
                .creator("user-ray"),
        )
        .unwrap();

    assert_eq!(item.assignee_id.as_deref(), Some(SAFETY_SUPERVISOR_ID));
    assert_eq!(item.due_date, item.created_at + Duration::hours(24));

    let system_comments: Vec<_> = item.comments.iter().filter(|c| c.system).collect();
    assert_eq!(system_comments.len(), 2);

    // creator differs from the forced assignee, so the supervisor is notified
    let inbox = engine.inbox(SAFETY_SUPERVISOR_ID).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "New assignment");
    assert_eq!(inbox[0].related_item_id, Some(item.id));
}

#[test]
fn disabled_rules_leave_the_draft_alone() {
    let mut engine = test_engine();
    engine.set_rule_enabled(RULE_SAFETY_ROUTING, false).unwrap();
    engine.set_rule_enabled(RULE_CRITICAL_SLA, false).unwrap();

    let due = Utc::now() + Duration::days(3);
    let item = engine
        .create(
            NewWorkItem::new(ItemKind::Incident, "Near miss at gate 2")
                .priority(Priority::Critical)
                .due_date(due),
        )
        .unwrap();

    assert_eq!(item.assignee_id, None);
    assert_eq!(item.due_date, due);
    assert!(item.comments.is_empty());
}

#[test]
fn rule_toggle_round_trips() {
    let mut engine = test_engine();

    let rule = engine.set_rule_enabled(RULE_SAFETY_ROUTING, false).unwrap();
    assert!(!rule.enabled);

    let rules = engine.rules().unwrap();
    let safety = rules.iter().find(|r| r.id == RULE_SAFETY_ROUTING).unwrap();
    assert!(!safety.enabled);

    let rule = engine.set_rule_enabled(RULE_SAFETY_ROUTING, true).unwrap();
    assert!(rule.enabled);
}

#[test]
fn toggling_unknown_rule_is_not_found() {
    let mut engine = test_engine();
    assert!(matches!(
        engine.set_rule_enabled("no-such-rule", true),
        Err(Error::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Creation notifications
// ---------------------------------------------------------------------------

#[test]
fn assignment_notification_skipped_when_creator_assigns_themselves() {
    let mut engine = test_engine();

    engine
        .create(
            NewWorkItem::new(ItemKind::Task, "Walk the perimeter fence")
                .creator("user-dana")
                .assignee("user-dana"),
        )
        .unwrap();

    assert!(engine.inbox("user-dana").unwrap().is_empty());
}

#[test]
fn anonymous_submission_still_notifies_assignee() {
    let mut engine = test_engine();

    let item = engine
        .create(NewWorkItem::new(ItemKind::Task, "Clear the loading bay").assignee("user-dana"))
        .unwrap();

    let inbox = engine.inbox("user-dana").unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].related_item_id, Some(item.id));
}

#[test]
fn create_notifies_first_pending_step_skipping_preresolved() {
    let mut engine = test_engine();

    let mut decided = ApprovalStep::new("Foreman", "Sam", "user-sam");
    decided.decision = Decision::Approved;
    decided.decision_date = Some(Utc::now());

    engine
        .create(
            NewWorkItem::new(ItemKind::Approval, "Hot work permit")
                .creator("user-ray")
                .approval_step(decided)
                .approval_step(ApprovalStep::new("Site Manager", "Dana", "user-dana")),
        )
        .unwrap();

    // the pre-approved first step gets nothing; the second step's approver does
    assert!(engine.inbox("user-sam").unwrap().is_empty());
    let inbox = engine.inbox("user-dana").unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "Approval required");
}

// ---------------------------------------------------------------------------
// Status changes
// ---------------------------------------------------------------------------

#[test]
fn update_status_persists_and_notifies_creator() {
    let mut engine = test_engine();

    let item = engine
        .create(NewWorkItem::new(ItemKind::Task, "Grade the access road").creator("user-ray"))
        .unwrap();

    let item = engine.update_status(item.id, Status::InProgress).unwrap();
    assert_eq!(item.status, Status::InProgress);
    assert_eq!(engine.get(item.id).unwrap().status, Status::InProgress);

    let inbox = engine.inbox("user-ray").unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "Status changed");
}

#[test]
fn update_status_skips_notification_for_anonymous_creator() {
    let mut engine = test_engine();

    let item = engine
        .create(NewWorkItem::new(ItemKind::Task, "Anonymous report"))
        .unwrap();
    engine.update_status(item.id, Status::InProgress).unwrap();

    // nothing emitted anywhere: no creator, no assignee
    assert!(engine.list().unwrap().len() == 1);
}

#[test]
fn invalid_transition_errors_and_persists_nothing() {
    let mut engine = test_engine();

    let item = engine
        .create(NewWorkItem::new(ItemKind::Task, "Strike the scaffold"))
        .unwrap();
    engine.update_status(item.id, Status::Done).unwrap();

    let result = engine.update_status(item.id, Status::Open);
    assert!(matches!(result, Err(Error::InvalidTransition { .. })));
    assert_eq!(engine.get(item.id).unwrap().status, Status::Done);
}

#[test]
fn list_by_status_filters() {
    let mut engine = test_engine();

    let open = engine
        .create(NewWorkItem::new(ItemKind::Task, "Stack the pallets"))
        .unwrap();
    let started = engine
        .create(NewWorkItem::new(ItemKind::Task, "Unload the delivery").status(Status::InProgress))
        .unwrap();

    let open_items = engine.list_by_status(Status::Open).unwrap();
    assert_eq!(open_items.len(), 1);
    assert_eq!(open_items[0].id, open.id);

    let in_progress = engine.list_by_status(Status::InProgress).unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].id, started.id);

    assert!(engine.list_by_status(Status::Done).unwrap().is_empty());
    assert_eq!(engine.list().unwrap().len(), 2);
}

#[test]
fn update_status_of_missing_item_is_not_found() {
    let mut engine = test_engine();
    assert!(matches!(
        engine.update_status(ItemId::new(), Status::Done),
        Err(Error::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Generic update
// ---------------------------------------------------------------------------

#[test]
fn patch_edits_fields_without_notifications() {
    let mut engine = test_engine();

    let item = engine
        .create(
            NewWorkItem::new(ItemKind::Task, "Inspect formwork")
                .creator("user-ray")
                .assignee("user-dana"),
        )
        .unwrap();
    let baseline = engine.inbox("user-dana").unwrap().len();

    let patch = WorkItemPatch {
        title: Some("Inspect formwork, level 2".to_string()),
        priority: Some(Priority::High),
        assignee_id: Some(None), // explicit clear
        ..Default::default()
    };
    let item = engine.update(item.id, patch).unwrap();

    assert_eq!(item.title, "Inspect formwork, level 2");
    assert_eq!(item.priority, Priority::High);
    assert_eq!(item.assignee_id, None);
    assert_eq!(engine.inbox("user-dana").unwrap().len(), baseline);
    assert_eq!(engine.inbox("user-ray").unwrap().len(), 0);
}

#[test]
fn subtasks_toggle_independently() {
    let mut engine = test_engine();

    let item = engine
        .create(
            NewWorkItem::new(ItemKind::Task, "Site induction")
                .subtask(Subtask::new("issue PPE"))
                .subtask(Subtask::new("sign register")),
        )
        .unwrap();

    let first = item.subtasks[0].id;
    let item = engine.set_subtask_done(item.id, first, true).unwrap();
    assert!(item.subtasks[0].done);
    assert!(!item.subtasks[1].done);

    let item = engine.set_subtask_done(item.id, first, false).unwrap();
    assert!(!item.subtasks[0].done);
}

#[test]
fn toggling_missing_subtask_is_not_found() {
    let mut engine = test_engine();
    let item = engine
        .create(NewWorkItem::new(ItemKind::Task, "No subtasks here"))
        .unwrap();

    assert!(matches!(
        engine.set_subtask_done(item.id, uuid::Uuid::new_v4(), true),
        Err(Error::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[test]
fn comment_notifies_assignee_and_creator_but_never_the_author() {
    let mut engine = test_engine();

    let item = engine
        .create(
            NewWorkItem::new(ItemKind::Task, "Seal the slab")
                .creator("user-ray")
                .assignee("user-dana"),
        )
        .unwrap();

    // a third party comments: both assignee and creator hear about it
    engine
        .add_comment(item.id, Some("user-lee"), "Slab looks cured")
        .unwrap();
    assert_eq!(engine.inbox("user-dana").unwrap().len(), 2); // assignment + comment
    assert_eq!(engine.inbox("user-ray").unwrap().len(), 1);
    assert!(engine.inbox("user-lee").unwrap().is_empty());

    // the assignee comments: only the creator is notified
    engine
        .add_comment(item.id, Some("user-dana"), "Starting sealing now")
        .unwrap();
    assert_eq!(engine.inbox("user-dana").unwrap().len(), 2);
    assert_eq!(engine.inbox("user-ray").unwrap().len(), 2);
}

#[test]
fn comment_never_double_notifies_a_user_who_is_assignee_and_creator() {
    let mut engine = test_engine();

    let item = engine
        .create(
            NewWorkItem::new(ItemKind::Task, "Check dewatering pump")
                .creator("user-dana")
                .assignee("user-dana"),
        )
        .unwrap();

    engine
        .add_comment(item.id, Some("user-lee"), "Pump is cavitating")
        .unwrap();

    let inbox = engine.inbox("user-dana").unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "New comment");
}

#[test]
fn comments_append_in_order() {
    let mut engine = test_engine();

    let item = engine
        .create(NewWorkItem::new(ItemKind::Task, "Snag list"))
        .unwrap();
    engine.add_comment(item.id, Some("user-a"), "first").unwrap();
    let item = engine.add_comment(item.id, Some("user-b"), "second").unwrap();

    assert_eq!(item.comments.len(), 2);
    assert_eq!(item.comments[0].body, "first");
    assert_eq!(item.comments[1].body, "second");
    assert!(!item.comments[0].system);
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[test]
fn chainless_items_complete_from_open_or_in_progress() {
    let mut engine = test_engine();

    let a = engine
        .create(NewWorkItem::new(ItemKind::Task, "Sweep the deck"))
        .unwrap();
    assert_eq!(engine.complete(a.id).unwrap().status, Status::Done);

    let b = engine
        .create(NewWorkItem::new(ItemKind::Task, "Coil the hoses").status(Status::InProgress))
        .unwrap();
    assert_eq!(engine.complete(b.id).unwrap().status, Status::Done);
}

#[test]
fn chained_items_complete_only_from_approved() {
    let mut engine = test_engine();

    let item = engine
        .create(
            NewWorkItem::new(ItemKind::Approval, "Concrete pour sign-off")
                .status(Status::PendingApproval)
                .approval_step(ApprovalStep::new("Site Manager", "Dana", "user-dana")),
        )
        .unwrap();

    assert!(matches!(engine.complete(item.id), Err(Error::Validation(_))));

    let step_id = item.approval_chain[0].id;
    engine
        .submit_decision(item.id, step_id, Decision::Approved, None)
        .unwrap();

    assert_eq!(engine.complete(item.id).unwrap().status, Status::Done);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn file_backed_engine_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("siteops.db");

    let id = {
        let mut engine = Engine::open(&path).unwrap();
        engine
            .create(
                NewWorkItem::new(
                    ItemKind::Custody {
                        asset_id: "asset-42".into(),
                        employee_id: "user-lee".into(),
                    },
                    "Hand over the laser level",
                )
                .creator("user-ray"),
            )
            .unwrap()
            .id
    };

    let engine = Engine::open(&path).unwrap();
    let item = engine.get(id).unwrap();
    assert_eq!(item.title, "Hand over the laser level");
    assert!(matches!(item.kind, ItemKind::Custody { .. }));
}
