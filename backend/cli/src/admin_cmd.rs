//! Operator actions from the terminal: take over a session, write into it.

use anyhow::Result;

use concierge_core::SessionId;

use crate::context::AppContext;
use crate::terminal_output::{format_message, note_success, supports_color};

pub async fn take_over(ctx: &AppContext, id: String, operator: Option<String>) -> Result<()> {
    let operator = ctx.operator(operator);
    let transcript = ctx.panel().take_over(&operator, &SessionId::from(id)).await?;
    note_success(&format!(
        "{} joined session {} (version {})",
        operator.username, transcript.session_id, transcript.version
    ));
    if let Some(last) = transcript.messages.last() {
        println!("{}", format_message(last, supports_color()));
    }
    Ok(())
}

pub async fn send(ctx: &AppContext, id: String, text: String, operator: Option<String>) -> Result<()> {
    let operator = ctx.operator(operator);
    let id = SessionId::from(id);
    let transcript = ctx
        .panel()
        .send_admin_message(&operator, Some(&id), &text)
        .await?;
    note_success(&format!("Sent to {} ({} messages)", id, transcript.messages.len()));
    Ok(())
}
