use serde::Serialize;

/// Externally visible widget state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetState {
    Closed,
    OpenCollectingProfile,
    OpenChatting,
    OpenChattingAdminRequested,
    OpenChattingAdminActive,
    OpenChattingWhatsappFallback,
}

impl WidgetState {
    pub fn is_open(&self) -> bool {
        !matches!(self, WidgetState::Closed)
    }

    pub fn is_chatting(&self) -> bool {
        !matches!(self, WidgetState::Closed | WidgetState::OpenCollectingProfile)
    }
}

impl std::fmt::Display for WidgetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WidgetState::Closed => "closed",
            WidgetState::OpenCollectingProfile => "open-collecting-profile",
            WidgetState::OpenChatting => "open-chatting",
            WidgetState::OpenChattingAdminRequested => "open-chatting-admin-requested",
            WidgetState::OpenChattingAdminActive => "open-chatting-admin-active",
            WidgetState::OpenChattingWhatsappFallback => "open-chatting-whatsapp-fallback",
        };
        write!(f, "{}", s)
    }
}

/// Whether the panel is shown and what it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Closed,
    CollectingProfile,
    Chatting,
}

/// Escalation sub-state. Survives close/open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Unescalated,
    AdminRequested,
    AdminActive,
    WhatsappFallback,
}

pub(crate) fn compose(stage: Stage, phase: Phase) -> WidgetState {
    match (stage, phase) {
        (Stage::Closed, _) => WidgetState::Closed,
        (Stage::CollectingProfile, _) => WidgetState::OpenCollectingProfile,
        (Stage::Chatting, Phase::Unescalated) => WidgetState::OpenChatting,
        (Stage::Chatting, Phase::AdminRequested) => WidgetState::OpenChattingAdminRequested,
        (Stage::Chatting, Phase::AdminActive) => WidgetState::OpenChattingAdminActive,
        (Stage::Chatting, Phase::WhatsappFallback) => WidgetState::OpenChattingWhatsappFallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_hides_phase() {
        assert_eq!(compose(Stage::Closed, Phase::AdminActive), WidgetState::Closed);
        assert_eq!(
            compose(Stage::Chatting, Phase::AdminRequested).to_string(),
            "open-chatting-admin-requested"
        );
        assert!(!WidgetState::OpenCollectingProfile.is_chatting());
        assert!(WidgetState::OpenCollectingProfile.is_open());
    }
}
