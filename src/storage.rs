//! SQLite storage layer.
//!
//! Typed collections keyed by entity id: work items, notifications, and
//! automation rules. All mutations go through the engine, which owns this
//! struct exclusively; that ownership is what serializes writers per
//! collection. Work-item mutations are full-row overwrites (read, modify,
//! write back; last write wins), matching the store contract the engine
//! is built against.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::automation::{AutomationRule, default_rules};
use crate::error::{Error, Result};
use crate::model::*;
use crate::notify::{NewNotification, Notification, NotificationKind};

/// Storage backend. Owns the SQLite connection.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    fn init(&self) -> Result<()> {
        // WAL mode for concurrent readers
        self.conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS work_items (
                id              TEXT PRIMARY KEY,
                kind            TEXT NOT NULL,
                priority        TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'open',
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                tags            TEXT NOT NULL DEFAULT '[]',
                project_id      TEXT,
                assignee_id     TEXT,
                creator_id      TEXT,
                comments        TEXT NOT NULL DEFAULT '[]',
                subtasks        TEXT NOT NULL DEFAULT '[]',
                approval_chain  TEXT NOT NULL DEFAULT '[]',
                due_date        TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_status ON work_items(status);
            CREATE INDEX IF NOT EXISTS idx_items_assignee ON work_items(assignee_id)
                WHERE assignee_id IS NOT NULL;

            CREATE TABLE IF NOT EXISTS notifications (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                title           TEXT NOT NULL,
                message         TEXT NOT NULL,
                kind            TEXT NOT NULL,
                is_read         INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                related_item_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_user
                ON notifications(user_id, created_at);

            CREATE TABLE IF NOT EXISTS automation_rules (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                description TEXT NOT NULL,
                enabled     INTEGER NOT NULL,
                trigger_    TEXT NOT NULL
            );
            ",
        )?;

        self.seed_rules()
    }

    /// Seed the default automation rules. Existing rows (including toggled
    /// ones) are left untouched.
    fn seed_rules(&self) -> Result<()> {
        for rule in default_rules() {
            self.conn.execute(
                "INSERT OR IGNORE INTO automation_rules (id, name, description, enabled, trigger_)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    rule.id,
                    rule.name,
                    rule.description,
                    rule.enabled as i64,
                    rule.trigger,
                ],
            )?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Work Items
    // -----------------------------------------------------------------------

    /// Insert a new work item.
    pub fn insert_work_item(&mut self, item: &WorkItem) -> Result<()> {
        self.conn.execute(
            "INSERT INTO work_items (
                id, kind, priority, status, title, description, tags,
                project_id, assignee_id, creator_id, comments, subtasks,
                approval_chain, due_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                item.id.0.to_string(),
                to_json(&item.kind)?,
                item.priority.to_string(),
                item.status.to_string(),
                item.title,
                item.description,
                to_json(&item.tags)?,
                item.project_id,
                item.assignee_id,
                item.creator_id,
                to_json(&item.comments)?,
                to_json(&item.subtasks)?,
                to_json(&item.approval_chain)?,
                item.due_date.to_rfc3339(),
                item.created_at.to_rfc3339(),
                item.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a work item by ID.
    pub fn get_work_item(&self, id: ItemId) -> Result<WorkItem> {
        let row = self
            .conn
            .query_row(
                "SELECT * FROM work_items WHERE id = ?1",
                params![id.0.to_string()],
                |row| Ok(row_to_work_item(row)),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        row.map_err(|e| Error::Other(format!("failed to parse work item: {e}")))
    }

    /// Overwrite a work item row with the given entity. Last write wins.
    pub fn update_work_item(&mut self, item: &WorkItem) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE work_items SET
                kind = ?1, priority = ?2, status = ?3, title = ?4,
                description = ?5, tags = ?6, project_id = ?7, assignee_id = ?8,
                creator_id = ?9, comments = ?10, subtasks = ?11,
                approval_chain = ?12, due_date = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                to_json(&item.kind)?,
                item.priority.to_string(),
                item.status.to_string(),
                item.title,
                item.description,
                to_json(&item.tags)?,
                item.project_id,
                item.assignee_id,
                item.creator_id,
                to_json(&item.comments)?,
                to_json(&item.subtasks)?,
                to_json(&item.approval_chain)?,
                item.due_date.to_rfc3339(),
                item.updated_at.to_rfc3339(),
                item.id.0.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(Error::NotFound(item.id.to_string()));
        }
        Ok(())
    }

    /// Remove a work item.
    pub fn delete_work_item(&mut self, id: ItemId) -> Result<()> {
        let changed = self.conn.execute(
            "DELETE FROM work_items WHERE id = ?1",
            params![id.0.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// List all work items, newest first.
    pub fn list_work_items(&self) -> Result<Vec<WorkItem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM work_items ORDER BY created_at DESC")?;
        let rows = stmt
            .query_map([], |row| Ok(row_to_work_item(row)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        collect_items(rows)
    }

    /// List work items in a given status, newest first.
    pub fn list_by_status(&self, status: Status) -> Result<Vec<WorkItem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM work_items WHERE status = ?1 ORDER BY created_at DESC")?;
        let rows = stmt
            .query_map(params![status.to_string()], |row| Ok(row_to_work_item(row)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        collect_items(rows)
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Persist a notification. The single sink operation the engine uses.
    pub fn insert_notification(&mut self, new: NewNotification) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title,
            message: new.message,
            kind: new.kind,
            read: false,
            created_at: Utc::now(),
            related_item_id: new.related_item_id,
        };

        self.conn.execute(
            "INSERT INTO notifications (id, user_id, title, message, kind, is_read, created_at, related_item_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                notification.id.to_string(),
                notification.user_id,
                notification.title,
                notification.message,
                notification.kind.to_string(),
                notification.read as i64,
                notification.created_at.to_rfc3339(),
                notification.related_item_id.map(|id| id.0.to_string()),
            ],
        )?;

        Ok(notification)
    }

    /// Notifications addressed to a user, newest first.
    pub fn list_notifications_for(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, message, kind, is_read, created_at, related_item_id
             FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;

        let rows = stmt
            .query_map(params![user_id], |row| Ok(row_to_notification(row)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| Error::Other(format!("parse error: {e}")))?);
        }
        Ok(result)
    }

    /// Mark a notification as read. Owned by the notification surface, not
    /// the engine core.
    pub fn mark_notification_read(&mut self, id: Uuid) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Automation rules
    // -----------------------------------------------------------------------

    /// The persisted rule configuration, in id order.
    pub fn list_rules(&self) -> Result<Vec<AutomationRule>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, enabled, trigger_ FROM automation_rules ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(AutomationRule {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    enabled: row.get::<_, i64>(3)? != 0,
                    trigger: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Toggle a rule and return its new state.
    pub fn set_rule_enabled(&mut self, rule_id: &str, enabled: bool) -> Result<AutomationRule> {
        let changed = self.conn.execute(
            "UPDATE automation_rules SET enabled = ?1 WHERE id = ?2",
            params![enabled as i64, rule_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(rule_id.to_string()));
        }

        let rules = self.list_rules()?;
        rules
            .into_iter()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| Error::NotFound(rule_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Row parsing helpers
// ---------------------------------------------------------------------------

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Other(format!("serialize error: {e}")))
}

fn collect_items(
    rows: Vec<std::result::Result<WorkItem, String>>,
) -> Result<Vec<WorkItem>> {
    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| Error::Other(format!("parse error: {e}")))?);
    }
    Ok(result)
}

fn row_to_work_item(row: &rusqlite::Row) -> std::result::Result<WorkItem, String> {
    let id_str: String = row.get(0).map_err(|e| e.to_string())?;
    let kind_str: String = row.get(1).map_err(|e| e.to_string())?;
    let priority_str: String = row.get(2).map_err(|e| e.to_string())?;
    let status_str: String = row.get(3).map_err(|e| e.to_string())?;
    let tags_str: String = row.get(6).map_err(|e| e.to_string())?;
    let comments_str: String = row.get(10).map_err(|e| e.to_string())?;
    let subtasks_str: String = row.get(11).map_err(|e| e.to_string())?;
    let chain_str: String = row.get(12).map_err(|e| e.to_string())?;
    let due_str: String = row.get(13).map_err(|e| e.to_string())?;
    let created_str: String = row.get(14).map_err(|e| e.to_string())?;
    let updated_str: String = row.get(15).map_err(|e| e.to_string())?;

    Ok(WorkItem {
        id: ItemId(id_str.parse().map_err(|e: uuid::Error| e.to_string())?),
        kind: serde_json::from_str(&kind_str).map_err(|e| e.to_string())?,
        priority: parse_priority(&priority_str)?,
        status: parse_status(&status_str)?,
        title: row.get(4).map_err(|e| e.to_string())?,
        description: row.get(5).map_err(|e| e.to_string())?,
        tags: serde_json::from_str(&tags_str).map_err(|e| e.to_string())?,
        project_id: row.get(7).map_err(|e| e.to_string())?,
        assignee_id: row.get(8).map_err(|e| e.to_string())?,
        creator_id: row.get(9).map_err(|e| e.to_string())?,
        comments: serde_json::from_str(&comments_str).map_err(|e| e.to_string())?,
        subtasks: serde_json::from_str(&subtasks_str).map_err(|e| e.to_string())?,
        approval_chain: serde_json::from_str(&chain_str).map_err(|e| e.to_string())?,
        due_date: parse_timestamp(&due_str)?,
        created_at: parse_timestamp(&created_str)?,
        updated_at: parse_timestamp(&updated_str)?,
    })
}

fn row_to_notification(row: &rusqlite::Row) -> std::result::Result<Notification, String> {
    let id_str: String = row.get(0).map_err(|e| e.to_string())?;
    let kind_str: String = row.get(4).map_err(|e| e.to_string())?;
    let created_str: String = row.get(6).map_err(|e| e.to_string())?;
    let related_str: Option<String> = row.get(7).map_err(|e| e.to_string())?;

    Ok(Notification {
        id: id_str.parse().map_err(|e: uuid::Error| e.to_string())?,
        user_id: row.get(1).map_err(|e| e.to_string())?,
        title: row.get(2).map_err(|e| e.to_string())?,
        message: row.get(3).map_err(|e| e.to_string())?,
        kind: parse_notification_kind(&kind_str),
        read: row.get::<_, i64>(5).map_err(|e| e.to_string())? != 0,
        created_at: parse_timestamp(&created_str)?,
        related_item_id: related_str
            .map(|s| s.parse().map(ItemId))
            .transpose()
            .map_err(|e: uuid::Error| e.to_string())?,
    })
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    s.parse().map_err(|_| format!("invalid timestamp: {s}"))
}

fn parse_status(s: &str) -> std::result::Result<Status, String> {
    match s {
        "open" => Ok(Status::Open),
        "in_progress" => Ok(Status::InProgress),
        "pending_approval" => Ok(Status::PendingApproval),
        "approved" => Ok(Status::Approved),
        "rejected" => Ok(Status::Rejected),
        "done" => Ok(Status::Done),
        _ => Err(format!("unknown status: {s}")),
    }
}

fn parse_priority(s: &str) -> std::result::Result<Priority, String> {
    match s {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        "critical" => Ok(Priority::Critical),
        _ => Err(format!("unknown priority: {s}")),
    }
}

fn parse_notification_kind(s: &str) -> NotificationKind {
    match s {
        "warning" => NotificationKind::Warning,
        "success" => NotificationKind::Success,
        "error" => NotificationKind::Error,
        _ => NotificationKind::Info,
    }
}
