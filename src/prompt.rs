use crate::provider::Message;

/// Flatten a conversation into a single prompt string for backends that
/// accept only one prompt rather than a structured message list.
///
/// Layout: the system prompt (when present) first as a labeled line, then
/// each message as `"<Role>: <content>"` with the role capitalized, then a
/// trailing open-ended cue for the assistant's turn. Message order equals
/// line order; nothing is reordered or deduplicated.
pub fn flatten(messages: &[Message], system_prompt: Option<&str>) -> String {
    let mut parts = Vec::with_capacity(messages.len() + 2);

    if let Some(system) = system_prompt {
        parts.push(format!("System: {system}\n"));
    }

    for msg in messages {
        parts.push(format!("{}: {}\n", msg.role.label(), msg.content));
    }

    parts.push("Assistant:".to_string());

    parts.join("\n")
}
