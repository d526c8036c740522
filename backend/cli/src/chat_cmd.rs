//! `concierge chat`: the chat widget driven from a terminal.
//!
//! Plain lines are chat messages. Slash commands drive the widget itself.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use concierge_core::{Message, SessionId};
use concierge_widget::{ChatWidget, WidgetState};

use crate::context::AppContext;
use crate::terminal_output::{
    format_message, note_error, note_info, note_warn, stream_write, supports_color, DIM, RESET,
};

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

const HELP: &str = "Commands: /admin  talk to a human, /clear  reset the chat, /close  hide the widget, \
/open  show it again, /skip  skip the profile form, /quit  exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Text(String),
    Admin,
    Clear,
    Close,
    Open,
    Skip,
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line {
        "/admin" => Input::Admin,
        "/clear" => Input::Clear,
        "/close" => Input::Close,
        "/open" => Input::Open,
        "/skip" => Input::Skip,
        "/help" | "/?" => Input::Help,
        "/quit" | "/exit" => Input::Quit,
        cmd if cmd.starts_with('/') && !cmd.contains(' ') => Input::Unknown(cmd.to_string()),
        text => Input::Text(text.to_string()),
    }
}

/// Where the terminal profile form is.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FormStep {
    Name,
    Company { name: String },
    Phone { name: String, company: String },
}

#[derive(Debug, PartialEq, Eq)]
enum FormOutcome {
    Next(FormStep),
    Submit {
        name: String,
        company: String,
        phone: Option<String>,
    },
    Invalid(FormStep, &'static str),
}

impl FormStep {
    fn prompt(&self) -> &'static str {
        match self {
            FormStep::Name => "Nama",
            FormStep::Company { .. } => "Perusahaan",
            FormStep::Phone { .. } => "No. telepon (opsional)",
        }
    }

    fn advance(self, input: &str) -> FormOutcome {
        let input = input.trim();
        match self {
            FormStep::Name if input.is_empty() => FormOutcome::Invalid(FormStep::Name, "name is required"),
            FormStep::Name => FormOutcome::Next(FormStep::Company { name: input.to_string() }),
            FormStep::Company { name } if input.is_empty() => {
                FormOutcome::Invalid(FormStep::Company { name }, "company is required")
            }
            FormStep::Company { name } => FormOutcome::Next(FormStep::Phone {
                name,
                company: input.to_string(),
            }),
            FormStep::Phone { name, company } => FormOutcome::Submit {
                name,
                company,
                phone: (!input.is_empty()).then(|| input.to_string()),
            },
        }
    }
}

/// Remembers which messages have been printed.
#[derive(Debug, Default)]
struct TranscriptView {
    seen: HashSet<String>,
}

impl TranscriptView {
    fn fresh<'a>(&mut self, messages: &'a [Message]) -> Vec<&'a Message> {
        messages
            .iter()
            .filter(|m| self.seen.insert(m.id.clone()))
            .collect()
    }
}

enum Flow {
    Continue,
    Quit,
}

struct TerminalChat {
    widget: ChatWidget,
    view: TranscriptView,
    form: Option<FormStep>,
    last_state: WidgetState,
    prompts_shown: bool,
    color: bool,
}

impl TerminalChat {
    async fn handle(&mut self, line: &str) -> Result<Flow> {
        match parse_input(line) {
            Input::Quit => return Ok(Flow::Quit),
            Input::Help => note_info(HELP),
            Input::Open => {
                let state = self.widget.open().await?;
                if state == WidgetState::OpenCollectingProfile && self.form.is_none() {
                    self.form = Some(FormStep::Name);
                }
            }
            Input::Close => {
                self.widget.close().await;
                self.form = None;
            }
            Input::Skip => {
                self.widget.skip_profile().await?;
                self.form = None;
            }
            Input::Admin => self.widget.request_admin().await?,
            Input::Clear => {
                self.widget.clear_chat().await?;
                self.prompts_shown = false;
            }
            Input::Unknown(cmd) => note_warn(&format!("Unknown command {cmd}. {HELP}")),
            Input::Text(text) if text.is_empty() => {}
            Input::Text(text) => match self.form.take() {
                Some(step) => self.fill_form(step, &text).await?,
                None => self.widget.send_message(&text).await?,
            },
        }
        Ok(Flow::Continue)
    }

    async fn fill_form(&mut self, step: FormStep, text: &str) -> Result<()> {
        match step.advance(text) {
            FormOutcome::Next(next) => self.form = Some(next),
            FormOutcome::Invalid(step, reason) => {
                note_warn(reason);
                self.form = Some(step);
            }
            FormOutcome::Submit { name, company, phone } => {
                if let Err(e) = self.widget.submit_profile(&name, &company, phone.as_deref()).await {
                    self.form = Some(FormStep::Name);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Print whatever changed since the last refresh.
    async fn refresh(&mut self) {
        let state = self.widget.state().await;
        if state != self.last_state {
            debug!(from = %self.last_state, to = %state, "Widget state changed");
            self.last_state = state;
            if let Some(hint) = state_hint(state) {
                note_info(hint);
            }
        }
        if !state.is_chatting() {
            return;
        }

        let messages = self.widget.messages().await;
        for message in self.view.fresh(&messages) {
            println!("{}", format_message(message, self.color));
        }

        if !self.prompts_shown {
            let prompts = self.widget.suggested_prompts().await;
            if !prompts.is_empty() {
                self.prompts_shown = true;
                let dim = if self.color { DIM } else { "" };
                let reset = if self.color { RESET } else { "" };
                println!("{dim}Coba tanyakan: {}{reset}", prompts.join(" | "));
            }
        }
    }

    fn prompt(&self) {
        let label = match &self.form {
            Some(step) => format!("{}: ", step.prompt()),
            None if self.last_state.is_open() => "> ".to_string(),
            None => "(closed, /open to show) ".to_string(),
        };
        let _ = stream_write(&mut std::io::stdout(), &label);
    }
}

fn state_hint(state: WidgetState) -> Option<&'static str> {
    match state {
        WidgetState::Closed => Some("Chat closed."),
        WidgetState::OpenCollectingProfile => {
            Some("Isi data diri Anda, atau ketik /skip untuk langsung chat.")
        }
        WidgetState::OpenChattingAdminRequested => Some("Menunggu admin bergabung..."),
        WidgetState::OpenChattingAdminActive => Some("Admin sedang menangani chat ini."),
        WidgetState::OpenChattingWhatsappFallback => {
            Some("Admin belum tersedia. Silakan lanjut via WhatsApp.")
        }
        WidgetState::OpenChatting => None,
    }
}

pub async fn run(ctx: &AppContext, session: Option<String>, server: Option<&str>) -> Result<()> {
    let session_id = session.map(SessionId::from).unwrap_or_else(SessionId::generate);
    let responder = ctx.chat_responder(server)?;
    let widget = ChatWidget::new(
        session_id.clone(),
        ctx.repo.clone(),
        responder,
        ctx.widget_config(),
    );

    note_info(&format!("Session {session_id}. {HELP}"));
    let state = widget.open().await?;

    let mut chat = TerminalChat {
        widget,
        view: TranscriptView::default(),
        form: (state == WidgetState::OpenCollectingProfile).then_some(FormStep::Name),
        last_state: WidgetState::Closed,
        prompts_shown: false,
        color: supports_color(),
    };
    chat.refresh().await;
    chat.prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match chat.handle(&line).await {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => note_error(&e.to_string()),
                }
                chat.refresh().await;
                chat.prompt();
            }
            _ = ticker.tick() => {
                let before = chat.view.seen.len();
                let state = chat.last_state;
                chat.refresh().await;
                if chat.view.seen.len() != before || chat.last_state != state {
                    chat.prompt();
                }
            }
        }
    }

    chat.widget.close().await;
    println!();
    note_info(&format!("Bye. Resume with: concierge chat --session {session_id}"));
    Ok(())
}
