// src/network/broadcast.rs

use crate::events::model::LogLevel;
use crate::network::events::{emit_chat_event, emit_network_event};
use crate::network::message::format_chat_line;
use crate::network::registry::FanOutReport;
use crate::node::NodeContext;

/// Send a locally typed line to every linked peer as `<user>: <text>`.
///
/// The line is in the history before any peer is written to; peers whose
/// write fails are dropped from the registry during the same pass.
pub async fn broadcast_message(ctx: &NodeContext, text: &str) -> FanOutReport {
    let line = format_chat_line(ctx.user_name(), text);
    let report = ctx.registry().fan_out(&line).await;
    emit_chat_event("broadcast", None, &line);
    if let Some(err) = &report.history_error {
        emit_network_event(
            "broadcast",
            LogLevel::Warn,
            "history_append_failed",
            None,
            Some(err.clone()),
        );
    }
    emit_network_event(
        "broadcast",
        LogLevel::Debug,
        "message_sent",
        None,
        Some(format!(
            "delivered={} pruned={}",
            report.delivered.len(),
            report.pruned.len()
        )),
    );
    report
}
