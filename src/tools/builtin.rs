//! Built-in tools registered by the CLI.
//!
//! Warehouse tools live with the application that owns the warehouses; these
//! two need nothing beyond the calling user and a clock.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::error::SluiceError;
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::{FnTool, Tool, ToolContext, UserId};
use crate::tools::types::ToolParameters;

/// `current_time`: the current UTC time, optionally with a fixed offset.
pub fn current_time_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "current_time",
        "Return the current date and time in RFC 3339 format",
        ToolParameters::object()
            .integer("utc_offset_minutes", "Offset from UTC in minutes", false)
            .build(),
        |args, _ctx: ToolContext| async move {
            let offset_minutes = match args.raw().get("utc_offset_minutes") {
                None | Some(serde_json::Value::Null) => 0,
                Some(_) => args.get_i64("utc_offset_minutes")?,
            };
            let offset = i32::try_from(offset_minutes.saturating_mul(60))
                .ok()
                .and_then(chrono::FixedOffset::east_opt)
                .ok_or_else(|| {
                    SluiceError::InvalidArgument(format!(
                        "utc_offset_minutes out of range: {offset_minutes}"
                    ))
                })?;
            let now = Utc::now().with_timezone(&offset);
            Ok(json!({"now": now.to_rfc3339_opts(SecondsFormat::Secs, true)}))
        },
    ))
}

/// `whoami`: the identity the tool instance was built for.
pub fn whoami_tool(user: &UserId) -> Arc<dyn Tool> {
    let user = user.clone();
    Arc::new(FnTool::new(
        "whoami",
        "Return the id of the user this conversation belongs to",
        ToolParameters::empty(),
        move |_args, _ctx| {
            let user = user.clone();
            async move { Ok(json!({"user_id": user})) }
        },
    ))
}

/// Registry with every built-in tool.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register_shared(current_time_tool())
        .register("whoami", whoami_tool);
    registry
}
