//! siteops CLI: operator interface to the workflow engine.

use clap::{Parser, Subcommand};
use uuid::Uuid;

use siteops::analysis;
use siteops::config::Config;
use siteops::engine::Engine;
use siteops::model::{
    ApprovalStep, Decision, ItemId, ItemKind, NewWorkItem, Priority, Status, WorkItem,
};
use siteops::telemetry;

#[derive(Parser)]
#[command(name = "siteops", about = "Construction-operations work item engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a work item
    Create {
        /// Kind: task, incident, observation, service-request, approval, custody
        kind: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// low, medium, high, critical
        #[arg(long, default_value = "medium")]
        priority: String,
        #[arg(long)]
        assignee: Option<String>,
        /// Creating user. Omit for an anonymous submission.
        #[arg(long)]
        creator: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        tag: Vec<String>,
        /// Approval step as "role:name:user-id". Repeatable, in chain order.
        #[arg(long)]
        approver: Vec<String>,
        /// Service type (service-request kind only)
        #[arg(long)]
        service_type: Option<String>,
        /// Department (service-request kind only)
        #[arg(long)]
        department: Option<String>,
        /// Asset id (custody kind only)
        #[arg(long)]
        asset: Option<String>,
        /// Employee id (custody kind only)
        #[arg(long)]
        employee: Option<String>,
    },
    /// Show a work item
    Show {
        /// Work item ID (full UUID or prefix)
        id: String,
    },
    /// List work items
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Move a work item to a new status
    Status { id: String, new_status: String },
    /// Add a comment
    Comment {
        id: String,
        body: String,
        #[arg(long)]
        author: Option<String>,
    },
    /// Record an approval decision on a step
    Decide {
        id: String,
        /// Approval step ID (full UUID or prefix)
        step: String,
        /// approve or reject
        decision: String,
        /// Required when rejecting
        #[arg(long)]
        comments: Option<String>,
    },
    /// Resubmit a rejected item for approval
    Resubmit { id: String },
    /// Complete a work item
    Complete { id: String },
    /// Toggle a subtask
    Subtask {
        id: String,
        /// Subtask ID (full UUID or prefix)
        subtask: String,
        #[arg(long)]
        undone: bool,
    },
    /// Items waiting on a user's approval
    Approvals { user: String },
    /// Automation rule operations
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
    /// Show a user's notifications
    Inbox {
        user: String,
        /// Mark everything shown as read
        #[arg(long)]
        mark_read: bool,
    },
    /// Ask the AI for a read on a work item (best-effort)
    Analyze { id: String },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List the rule configuration
    List,
    /// Enable a rule
    Enable { rule_id: String },
    /// Disable a rule
    Disable { rule_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    telemetry::init(&config.log_level);

    let mut engine = Engine::open(&config.database_path)?;

    match cli.command {
        Command::Create {
            kind,
            title,
            description,
            priority,
            assignee,
            creator,
            project,
            tag,
            approver,
            service_type,
            department,
            asset,
            employee,
        } => {
            let kind = parse_kind(&kind, service_type, department, asset, employee)?;
            let mut new = NewWorkItem::new(kind, title).priority(parse_priority(&priority)?);
            if let Some(description) = description {
                new = new.description(description);
            }
            if let Some(assignee) = assignee {
                new = new.assignee(assignee);
            }
            if let Some(creator) = creator {
                new = new.creator(creator);
            }
            if let Some(project) = project {
                new = new.project(project);
            }
            for t in tag {
                new = new.tag(t);
            }
            for raw in approver {
                new = new.approval_step(parse_approver(&raw)?);
            }
            let item = engine.create(new)?;
            print_item(&item);
        }
        Command::Show { id } => {
            let item = engine.get(resolve_id(&engine, &id)?)?;
            print_item(&item);
        }
        Command::List { status } => {
            let items = match status {
                Some(s) => engine.list_by_status(parse_status(&s)?)?,
                None => engine.list()?,
            };
            for item in items {
                println!(
                    "{}  {:<16} {:<10} {:<16} {}",
                    item.id, item.status, item.priority, item.kind, item.title
                );
            }
        }
        Command::Status { id, new_status } => {
            let item = engine.update_status(resolve_id(&engine, &id)?, parse_status(&new_status)?)?;
            println!("{} -> {}", item.id, item.status);
        }
        Command::Comment { id, body, author } => {
            let item = engine.add_comment(resolve_id(&engine, &id)?, author.as_deref(), body)?;
            println!("{}: {} comments", item.id, item.comments.len());
        }
        Command::Decide {
            id,
            step,
            decision,
            comments,
        } => {
            let item_id = resolve_id(&engine, &id)?;
            let item = engine.get(item_id)?;
            let step_id = resolve_step_id(&item, &step)?;
            let item =
                engine.submit_decision(item_id, step_id, parse_decision(&decision)?, comments)?;
            println!("{} -> {}", item.id, item.status);
        }
        Command::Resubmit { id } => {
            let item = engine.resubmit(resolve_id(&engine, &id)?)?;
            println!("{} -> {}", item.id, item.status);
        }
        Command::Complete { id } => {
            let item = engine.complete(resolve_id(&engine, &id)?)?;
            println!("{} -> {}", item.id, item.status);
        }
        Command::Subtask { id, subtask, undone } => {
            let item_id = resolve_id(&engine, &id)?;
            let item = engine.get(item_id)?;
            let subtask_id = item
                .subtasks
                .iter()
                .find(|s| s.id.to_string().starts_with(&subtask))
                .map(|s| s.id)
                .ok_or_else(|| anyhow::anyhow!("no subtask matching {subtask}"))?;
            let item = engine.set_subtask_done(item_id, subtask_id, !undone)?;
            print_item(&item);
        }
        Command::Approvals { user } => {
            for item in engine.pending_approvals_for(&user)? {
                println!("{}  {:<16} {}", item.id, item.status, item.title);
            }
        }
        Command::Rules { action } => match action {
            RulesAction::List => {
                for rule in engine.rules()? {
                    println!(
                        "{:<16} {:<8} {}  ({})",
                        rule.id,
                        if rule.enabled { "on" } else { "off" },
                        rule.name,
                        rule.trigger
                    );
                }
            }
            RulesAction::Enable { rule_id } => {
                let rule = engine.set_rule_enabled(&rule_id, true)?;
                println!("{} -> on", rule.id);
            }
            RulesAction::Disable { rule_id } => {
                let rule = engine.set_rule_enabled(&rule_id, false)?;
                println!("{} -> off", rule.id);
            }
        },
        Command::Inbox { user, mark_read } => {
            let notifications = engine.inbox(&user)?;
            for n in &notifications {
                println!(
                    "{} [{}] {}: {}",
                    if n.read { " " } else { "*" },
                    n.kind,
                    n.title,
                    n.message
                );
            }
            if mark_read {
                for n in notifications {
                    engine.mark_notification_read(n.id)?;
                }
            }
        }
        Command::Analyze { id } => {
            let item = engine.get(resolve_id(&engine, &id)?)?;
            match &config.anthropic_api_key {
                Some(key) => {
                    let client = analysis::anthropic_client(key)?;
                    println!("{}", analysis::analyze(&client, &item).await);
                }
                None => println!(
                    "Analysis is unavailable: ANTHROPIC_API_KEY is not set. \
                     The work item is unaffected."
                ),
            }
        }
    }

    Ok(())
}

/// Resolve a full UUID or unique prefix to a work item ID.
fn resolve_id(engine: &Engine, input: &str) -> anyhow::Result<ItemId> {
    if let Ok(uuid) = input.parse::<Uuid>() {
        return Ok(ItemId(uuid));
    }
    let matches: Vec<ItemId> = engine
        .list()?
        .into_iter()
        .map(|item| item.id)
        .filter(|id| id.0.to_string().starts_with(input))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => anyhow::bail!("no work item matching {input}"),
        _ => anyhow::bail!("ambiguous id prefix {input}"),
    }
}

fn resolve_step_id(item: &WorkItem, input: &str) -> anyhow::Result<Uuid> {
    item.approval_chain
        .iter()
        .find(|s| s.id.to_string().starts_with(input))
        .map(|s| s.id)
        .ok_or_else(|| anyhow::anyhow!("no approval step matching {input}"))
}

/// Parse "role:name:user-id" into an approval step.
fn parse_approver(raw: &str) -> anyhow::Result<ApprovalStep> {
    let parts: Vec<&str> = raw.splitn(3, ':').collect();
    match parts.as_slice() {
        [role, name, user_id] => Ok(ApprovalStep::new(*role, *name, *user_id)),
        _ => anyhow::bail!("expected role:name:user-id, got {raw}"),
    }
}

fn parse_kind(
    label: &str,
    service_type: Option<String>,
    department: Option<String>,
    asset: Option<String>,
    employee: Option<String>,
) -> anyhow::Result<ItemKind> {
    Ok(match label {
        "task" => ItemKind::Task,
        "incident" => ItemKind::Incident,
        "observation" => ItemKind::Observation,
        "approval" => ItemKind::Approval,
        "service-request" => ItemKind::ServiceRequest {
            service_type: service_type
                .ok_or_else(|| anyhow::anyhow!("service-request needs --service-type"))?,
            department: department
                .ok_or_else(|| anyhow::anyhow!("service-request needs --department"))?,
        },
        "custody" => ItemKind::Custody {
            asset_id: asset.ok_or_else(|| anyhow::anyhow!("custody needs --asset"))?,
            employee_id: employee.ok_or_else(|| anyhow::anyhow!("custody needs --employee"))?,
        },
        other => anyhow::bail!("unknown kind: {other}"),
    })
}

fn parse_priority(s: &str) -> anyhow::Result<Priority> {
    Ok(match s {
        "low" => Priority::Low,
        "medium" => Priority::Medium,
        "high" => Priority::High,
        "critical" => Priority::Critical,
        other => anyhow::bail!("unknown priority: {other}"),
    })
}

fn parse_status(s: &str) -> anyhow::Result<Status> {
    Ok(match s {
        "open" => Status::Open,
        "in-progress" | "in_progress" => Status::InProgress,
        "pending-approval" | "pending_approval" => Status::PendingApproval,
        "approved" => Status::Approved,
        "rejected" => Status::Rejected,
        "done" => Status::Done,
        other => anyhow::bail!("unknown status: {other}"),
    })
}

fn parse_decision(s: &str) -> anyhow::Result<Decision> {
    Ok(match s {
        "approve" | "approved" => Decision::Approved,
        "reject" | "rejected" => Decision::Rejected,
        other => anyhow::bail!("unknown decision: {other}"),
    })
}

fn print_item(item: &WorkItem) {
    println!("{}  {}", item.id, item.title);
    println!(
        "  kind {}  priority {}  status {}  due {}",
        item.kind,
        item.priority,
        item.status,
        item.due_date.format("%Y-%m-%d %H:%M")
    );
    if let Some(assignee) = &item.assignee_id {
        println!("  assignee {assignee}");
    }
    if let Some(creator) = &item.creator_id {
        println!("  creator {creator}");
    }
    if !item.tags.is_empty() {
        println!("  tags {}", item.tags.join(", "));
    }
    for subtask in &item.subtasks {
        println!(
            "  [{}] {}  {}",
            if subtask.done { "x" } else { " " },
            &subtask.id.to_string()[..8],
            subtask.title
        );
    }
    for step in &item.approval_chain {
        println!(
            "  step {}  {} ({})  {}{}",
            &step.id.to_string()[..8],
            step.role,
            step.approver_name,
            step.decision,
            step.comments
                .as_deref()
                .map(|c| format!(": {c}"))
                .unwrap_or_default()
        );
    }
    for comment in &item.comments {
        println!(
            "  {} {}",
            if comment.system { "[system]" } else { "[comment]" },
            comment.body
        );
    }
}
