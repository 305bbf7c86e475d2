//! Automation rule engine.
//!
//! A pure transformation applied once at work-item creation: given a
//! candidate item and the enabled rule configuration, returns the modified
//! item plus a log of applied actions (one line per fired rule). The engine
//! never reads or writes persisted items itself; rule configuration is
//! loaded by the caller and injected.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::model::{Priority, WorkItem};

/// Fixed identity all safety-sensitive items are routed to.
pub const SAFETY_SUPERVISOR_ID: &str = "user-safety-supervisor";

pub const RULE_SAFETY_ROUTING: &str = "safety-routing";
pub const RULE_CRITICAL_SLA: &str = "critical-sla";

/// SLA window applied to critical items, from creation time.
pub const CRITICAL_SLA_HOURS: i64 = 24;

/// Persisted rule configuration. Seeded once with the defaults, mutated only
/// by explicit enable/disable toggles, never by the workflow itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    /// Human-readable trigger summary, shown in the rule list.
    pub trigger: String,
}

/// The default rule set, seeded into storage on first use.
pub fn default_rules() -> Vec<AutomationRule> {
    vec![
        AutomationRule {
            id: RULE_SAFETY_ROUTING.to_string(),
            name: "Safety routing".to_string(),
            description: "Route incidents and observations to the safety supervisor".to_string(),
            enabled: true,
            trigger: "kind is incident or observation".to_string(),
        },
        AutomationRule {
            id: RULE_CRITICAL_SLA.to_string(),
            name: "Critical SLA".to_string(),
            description: format!(
                "Set a {CRITICAL_SLA_HOURS}h due date on critical-priority items"
            ),
            enabled: true,
            trigger: "priority is critical".to_string(),
        },
    ]
}

/// One registered rule: its persisted id plus the action it performs.
/// New rules slot in here without changing `apply_rules`'s signature.
struct RuleDef {
    id: &'static str,
    apply: fn(&mut WorkItem) -> Option<String>,
}

/// Evaluation order. The current rules can't conflict, but a fixed order
/// keeps the system-comment sequence deterministic.
const REGISTRY: &[RuleDef] = &[
    RuleDef {
        id: RULE_SAFETY_ROUTING,
        apply: route_to_safety_supervisor,
    },
    RuleDef {
        id: RULE_CRITICAL_SLA,
        apply: apply_critical_sla,
    },
];

/// Apply every enabled rule to the candidate item.
///
/// Returns the modified item and one log line per applied rule, in registry
/// order. Disabled rules and rule ids with no registry entry are no-ops.
pub fn apply_rules(mut item: WorkItem, rules: &[AutomationRule]) -> (WorkItem, Vec<String>) {
    let mut log = Vec::new();

    for def in REGISTRY {
        let enabled = rules.iter().any(|r| r.id == def.id && r.enabled);
        if !enabled {
            continue;
        }
        if let Some(line) = (def.apply)(&mut item) {
            log.push(line);
        }
    }

    (item, log)
}

fn route_to_safety_supervisor(item: &mut WorkItem) -> Option<String> {
    if !item.kind.is_safety_sensitive() {
        return None;
    }
    item.assignee_id = Some(SAFETY_SUPERVISOR_ID.to_string());
    Some(format!(
        "Automation: {} routed to the safety supervisor",
        item.kind
    ))
}

fn apply_critical_sla(item: &mut WorkItem) -> Option<String> {
    if item.priority != Priority::Critical {
        return None;
    }
    // SLA counts from creation, not from when the rule happens to run
    item.due_date = item.created_at + Duration::hours(CRITICAL_SLA_HOURS);
    Some(format!(
        "Automation: critical priority, due within {CRITICAL_SLA_HOURS}h"
    ))
}
