/// Session transcript export (HTML).
///
/// Produces a self-contained page an operator can archive or forward.
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use concierge_core::{Message, Role};

use crate::summary::SessionSummary;

pub struct SessionExporter {
    pub output_dir: PathBuf,
}

impl SessionExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub async fn export_html(&self, summary: &SessionSummary) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;
        let filename = format!("chat-{}.html", file_safe(summary.id.as_str()));
        let path = self.output_dir.join(&filename);

        tokio::fs::write(&path, render_html(summary))
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(session_id = %summary.id, path = %path.display(), "Exported transcript");
        Ok(path)
    }
}

fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "Pengguna",
        Role::Assistant => "Asisten",
        Role::Admin => "Admin",
        Role::System => "Sistem",
    }
}

fn render_message(m: &Message) -> String {
    let role_class = match m.role {
        Role::User => "msg-user",
        Role::Assistant if m.admin_info.is_some() || m.whatsapp_timeout.is_some() => "msg-notice",
        Role::Assistant => "msg-assistant",
        Role::Admin => "msg-admin",
        Role::System => "msg-notice",
    };

    let benefits = m
        .benefits
        .as_deref()
        .filter(|b| !b.is_empty())
        .map(|b| {
            let items: String = b
                .iter()
                .map(|x| format!("<li>{}</li>", html_escape(x)))
                .collect();
            format!(r#"<ul class="benefits">{items}</ul>"#)
        })
        .unwrap_or_default();

    let links: String = m
        .cta
        .iter()
        .flat_map(|c| c.primary.iter().chain(c.secondary.iter()))
        .map(|l| {
            format!(
                r#"<a class="cta" href="{}">{}</a>"#,
                html_escape(&l.link),
                html_escape(&l.text)
            )
        })
        .collect();

    format!(
        r#"<div class="message {rc}"><span class="role">{role}</span><span class="time">{time}</span><div class="content">{content}</div>{benefits}{links}</div>"#,
        rc = role_class,
        role = role_label(m.role),
        time = m.timestamp.format("%Y-%m-%d %H:%M"),
        content = html_escape(&m.content),
    )
}

pub fn render_html(summary: &SessionSummary) -> String {
    let msg_html: String = summary.messages.iter().map(render_message).collect();
    let title = format!("Chat {}", summary.display_name);
    let company = summary
        .profile
        .as_ref()
        .map(|p| format!(" &middot; {}", html_escape(&p.company)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="id">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 800px; margin: 2rem auto; padding: 0 1rem; background: #f9fafb; color: #111827; }}
.meta {{ color: #6b7280; margin-bottom: 1.5rem; }}
.message {{ margin-bottom: 1rem; border-radius: 8px; padding: 0.75rem 1rem; }}
.msg-user {{ background: #dbeafe; margin-left: 3rem; }}
.msg-assistant {{ background: #ffffff; border-left: 3px solid #2563eb; }}
.msg-admin {{ background: #dcfce7; border-left: 3px solid #16a34a; }}
.msg-notice {{ background: #fef3c7; font-style: italic; }}
.role {{ font-weight: 700; font-size: 0.75rem; text-transform: uppercase; color: #6b7280; margin-right: 0.5rem; }}
.time {{ font-size: 0.75rem; color: #9ca3af; }}
.content {{ white-space: pre-wrap; line-height: 1.6; margin-top: 0.25rem; }}
.benefits {{ margin: 0.5rem 0 0 1rem; }}
.cta {{ display: inline-block; margin: 0.5rem 0.5rem 0 0; color: #2563eb; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p class="meta">{id}{company} &middot; {status} &middot; {count} pesan</p>
{messages}
</body>
</html>"#,
        title = html_escape(&title),
        id = html_escape(summary.id.as_str()),
        status = summary.status.label(),
        count = summary.message_count,
        messages = msg_html,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
