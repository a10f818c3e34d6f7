//! `xstorage notifications list|unread|mark-read`.

use serde_json::Value;
use tabled::Tabled;

use xstorage_api::NotificationQuery;
use xstorage_core::{Coordinator, reduce};

use crate::cli::{GlobalOpts, NotificationsArgs, NotificationsCommand};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct NotificationRow {
    #[tabled(rename = "Alert")]
    alert_id: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Sub-type")]
    sub_type: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

fn text(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn to_row(item: &Value) -> NotificationRow {
    NotificationRow {
        alert_id: text(item, "alertId"),
        level: text(item, "level"),
        kind: text(item, "type"),
        sub_type: text(item, "subType"),
        status: text(item, "status"),
        created_at: text(item, "createdAt"),
    }
}

/// The `results` array of a reduced notifications body.
fn results(page: &Value) -> Vec<Value> {
    match page.get("results") {
        Some(Value::Array(items)) => items.iter().filter(|i| i.is_object()).cloned().collect(),
        _ => Vec::new(),
    }
}

pub async fn handle(coordinator: &Coordinator, args: NotificationsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let client = coordinator.client();

    match args.command {
        NotificationsCommand::List { status, size, offset } => {
            let query = NotificationQuery { status, size, offset };
            let body = util::ensure_successful(client.get_notifications(&query).await?)?;
            let items = results(&reduce(Ok(body)));

            let out = output::render_list(global.output_format(), &items, to_row)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NotificationsCommand::Unread => {
            let body = util::ensure_successful(client.get_unread_notifications_count().await?)?;
            let count = reduce(Ok(body));
            let out = output::render_single(global.output_format(), &count, |c| {
                let total = c.get("total").and_then(Value::as_u64).unwrap_or(0);
                format!("{total} unread")
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NotificationsCommand::MarkRead => {
            let response = util::ensure_successful(client.mark_all_notifications_read().await?)?;
            let out = output::render_single(global.output_format(), &response, |_| "All notifications marked as read".to_owned())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
