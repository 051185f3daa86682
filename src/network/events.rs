use crate::events::{
    dispatcher,
    model::{ChatEvent, LogEvent, LogLevel, NetworkEvent},
};

/// Emit a structured network event.
pub(crate) fn emit_network_event(
    component: &'static str,
    level: LogLevel,
    action: &str,
    addr: Option<String>,
    detail: Option<String>,
) {
    let mut meta = dispatcher::meta(component, level);
    meta.corr_id = Some(dispatcher::correlation_id());
    dispatcher::emit(LogEvent::Network(NetworkEvent {
        meta,
        action: action.to_string(),
        addr,
        detail,
    }));
}

/// Record a chat line in the event log. Never printed by the console sink;
/// the reader and prompt echo chat lines themselves.
pub(crate) fn emit_chat_event(component: &'static str, peer: Option<String>, line: &str) {
    let mut meta = dispatcher::meta(component, LogLevel::Info);
    meta.suppress_console = true;
    dispatcher::emit(LogEvent::Chat(ChatEvent {
        meta,
        peer,
        line: line.to_string(),
    }));
}
