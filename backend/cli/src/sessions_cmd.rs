//! CLI Sessions Subcommands
//!
//! The admin panel in the terminal: list, watch, inspect and export sessions.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;

use concierge_admin::{SessionExporter, SessionSummary};
use concierge_core::SessionId;

use crate::context::AppContext;
use crate::terminal_output::{
    format_message, note_info, note_success, render_table, status_badge, supports_color, Column,
};

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List sessions, most recently active first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Re-print the session list whenever it changes
    Watch,
    /// Show one session's transcript
    Show { id: String },
    /// Export a session transcript as HTML
    Export {
        id: String,
        /// Output directory (defaults to the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

pub async fn run(ctx: &AppContext, cmd: SessionCommands) -> Result<()> {
    let panel = ctx.panel();
    match cmd {
        SessionCommands::List { json } => {
            let sessions = panel.list_sessions(Utc::now()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                note_info("No sessions yet.");
            } else {
                print!("{}", sessions_table(&sessions, Utc::now(), supports_color()));
            }
        }
        SessionCommands::Watch => {
            let period = ctx.config.sessions_poll_interval();
            note_info(&format!(
                "Watching sessions every {}s. Press Ctrl+C to stop.",
                period.as_secs()
            ));
            let mut watch = panel.watch(period);
            loop {
                tokio::select! {
                    update = watch.changed() => {
                        let Some(sessions) = update else { break };
                        println!();
                        print!("{}", sessions_table(&sessions, Utc::now(), supports_color()));
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
        SessionCommands::Show { id } => {
            let summary = panel.session(&SessionId::from(id), Utc::now()).await?;
            print!("{}", render_summary(&summary, supports_color()));
        }
        SessionCommands::Export { id, out } => {
            let summary = panel.session(&SessionId::from(id), Utc::now()).await?;
            let dir = out.unwrap_or_else(|| PathBuf::from("."));
            let path = SessionExporter::new(dir).export_html(&summary).await?;
            note_success(&format!("Exported to {}", path.display()));
        }
    }
    Ok(())
}

/// The session list as the panel shows it: who, status, deadline, activity.
pub fn sessions_table(sessions: &[SessionSummary], now: DateTime<Utc>, color: bool) -> String {
    let columns = vec![
        Column::left("Session"),
        Column::left("Name").max_width(24),
        Column::left("Status"),
        Column::left("Deadline"),
        Column::right("Msgs"),
        Column::left("Last activity"),
        Column::left("Last message").max_width(40),
    ];

    let rows: Vec<Vec<String>> = sessions
        .iter()
        .map(|s| {
            vec![
                s.id.short().to_string(),
                s.display_name.clone(),
                status_badge(s.status, color),
                s.deadline_text.clone().unwrap_or_default(),
                s.message_count.to_string(),
                relative_time(s.last_activity, now),
                s.last_message()
                    .map(|m| m.content.replace('\n', " "))
                    .unwrap_or_default(),
            ]
        })
        .collect();

    render_table(&columns, &rows)
}

fn render_summary(summary: &SessionSummary, color: bool) -> String {
    let mut out = format!(
        "Session {} ({})\nStatus: {}\n",
        summary.id,
        summary.display_name,
        status_badge(summary.status, color)
    );
    if let Some(profile) = &summary.profile {
        out.push_str(&format!("Company: {}\n", profile.company));
        if let Some(phone) = &profile.phone {
            out.push_str(&format!("Phone: {phone}\n"));
        }
    }
    if let Some(deadline) = &summary.deadline_text {
        out.push_str(&format!("Deadline: {deadline}\n"));
    }
    out.push('\n');
    for message in &summary.messages {
        out.push_str(&format_message(message, color));
        out.push('\n');
    }
    out
}

fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => at.format("%Y-%m-%d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use concierge_core::{contact, EscalationPolicy, Message, UserProfile};

    fn summary(now: DateTime<Utc>) -> SessionSummary {
        let messages = vec![
            contact::welcome_message(None).with_timestamp(now - Duration::minutes(12)),
            Message::user("Apa syarat PPIU?").with_timestamp(now - Duration::minutes(11)),
            contact::admin_requested_notice(now - Duration::minutes(10)),
        ];
        let profile = UserProfile::from_form("Budi", "PT Maju", Some("0811")).unwrap();
        SessionSummary::build(
            SessionId::from("s_panel_1"),
            Some(profile),
            messages,
            &EscalationPolicy::default(),
            now,
        )
        .unwrap()
    }

    #[test]
    fn relative_times() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(relative_time(now - Duration::hours(3), now), "3h ago");
    }

    #[test]
    fn table_shows_status_and_deadline() {
        let now = Utc::now();
        let s = summary(now);
        let table = sessions_table(std::slice::from_ref(&s), now, false);
        assert!(table.contains("Budi"));
        assert!(table.contains(s.status_label));
        assert!(table.contains(s.deadline_text.as_deref().unwrap()));
        assert!(table.contains("10m ago"));
    }

    #[test]
    fn summary_lists_profile_and_transcript() {
        let now = Utc::now();
        let out = render_summary(&summary(now), false);
        assert!(out.contains("Company: PT Maju"));
        assert!(out.contains("Phone: 0811"));
        assert!(out.contains("You: Apa syarat PPIU?"));
    }
}
