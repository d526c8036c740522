//! Direct-contact links and the canned notices that carry them.
//!
//! Every failure path ends with a WhatsApp link so the user always has a
//! next step.

use chrono::{DateTime, Utc};

use crate::message::{AdminInfo, Cta, CtaLink, Message, UserProfile, WhatsappTimeout};

/// Number used when none is configured.
pub const DEFAULT_WHATSAPP_NUMBER: &str = "628123456789";

pub const WELCOME_TEXT: &str = "Halo! Selamat datang di PT Jaminan Solusi Bisnis.\n\n\
Saya asisten digital yang siap membantu Anda dengan informasi mengenai:\n\
• Izin Travel (PPIU, PIHK, Akreditasi, IATA)\n\
• Layanan Bisnis (Pajak, Bank Garansi, Keuangan)\n\n\
Ada yang bisa saya bantu?";

pub const RESPONDER_FAILURE_TEXT: &str =
    "Maaf, terjadi gangguan. Silakan hubungi kami langsung via WhatsApp.";

pub const SERVER_FAILURE_TEXT: &str = "Maaf, terjadi gangguan pada sistem. \
Silakan hubungi kami langsung via WhatsApp untuk bantuan segera.";

pub const ADMIN_REQUESTED_TEXT: &str = "Permintaan Anda untuk berbicara dengan admin telah dikirim. \
Admin kami akan merespon dalam 15 menit. Jika belum ada respon, Anda akan diarahkan ke WhatsApp.";

pub const ADMIN_JOINED_TEXT: &str =
    "Admin telah bergabung dalam chat ini. Selamat berbicara dengan tim ahli kami!";

pub const WHATSAPP_FALLBACK_TEXT: &str = "Mohon maaf, admin kami belum dapat merespon saat ini. \
Silakan lanjutkan percakapan melalui WhatsApp agar tim kami dapat membantu Anda secepatnya.";

pub const CONTACT_CTA_TEXT: &str = "Hubungi WhatsApp";

/// Builds WhatsApp links for the configured business number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactLinks {
    whatsapp_number: String,
}

impl Default for ContactLinks {
    fn default() -> Self {
        Self::new(DEFAULT_WHATSAPP_NUMBER)
    }
}

impl ContactLinks {
    pub fn new(whatsapp_number: impl Into<String>) -> Self {
        Self {
            whatsapp_number: whatsapp_number.into(),
        }
    }

    pub fn whatsapp_number(&self) -> &str {
        &self.whatsapp_number
    }

    pub fn whatsapp_link(&self) -> String {
        format!("https://wa.me/{}", self.whatsapp_number)
    }

    /// Link with a pre-filled, URL-encoded message.
    pub fn whatsapp_link_with_text(&self, text: &str) -> String {
        format!(
            "https://wa.me/{}?text={}",
            self.whatsapp_number,
            urlencoding::encode(text)
        )
    }

    pub fn contact_cta(&self) -> Cta {
        Cta::primary(CtaLink::new(CONTACT_CTA_TEXT, self.whatsapp_link()))
    }

    /// Assistant entry that replaces a failed responder answer.
    pub fn responder_failure_notice(&self) -> Message {
        Message::assistant(RESPONDER_FAILURE_TEXT).with_cta(self.contact_cta())
    }

    /// Entry appended when the admin response window elapses.
    pub fn whatsapp_fallback_notice(&self, at: DateTime<Utc>) -> Message {
        Message::assistant(WHATSAPP_FALLBACK_TEXT)
            .with_timestamp(at)
            .with_cta(self.contact_cta())
            .with_whatsapp_timeout(WhatsappTimeout {
                enabled: true,
                triggered_at: at,
                link: self.whatsapp_link(),
            })
    }
}

/// Greeting shown when chatting starts. Personalised once a profile exists,
/// which doubles as the acknowledgement of the profile form.
pub fn welcome_message(profile: Option<&UserProfile>) -> Message {
    match profile {
        Some(p) => Message::assistant(format!(
            "Terima kasih, {} dari {}! {}",
            p.name, p.company, WELCOME_TEXT
        )),
        None => Message::assistant(WELCOME_TEXT),
    }
}

/// Announcement appended when the user asks for a human.
pub fn admin_requested_notice(at: DateTime<Utc>) -> Message {
    Message::assistant(ADMIN_REQUESTED_TEXT)
        .with_timestamp(at)
        .with_admin_info(AdminInfo::requested(at))
}

/// Entry the admin panel appends on takeover.
pub fn admin_joined_notice(at: DateTime<Utc>, operator: Option<String>) -> Message {
    Message::assistant(ADMIN_JOINED_TEXT)
        .with_timestamp(at)
        .with_admin_info(AdminInfo::active(at, operator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_encoding() {
        let links = ContactLinks::new("6281");
        assert_eq!(links.whatsapp_link(), "https://wa.me/6281");
        assert_eq!(
            links.whatsapp_link_with_text("Halo, saya"),
            "https://wa.me/6281?text=Halo%2C%20saya"
        );
    }

    #[test]
    fn test_fallback_notice_is_annotated_with_link() {
        let links = ContactLinks::default();
        let msg = links.whatsapp_fallback_notice(Utc::now());
        assert!(msg.is_whatsapp_fallback());
        let cta = msg.cta.unwrap().primary.unwrap();
        assert_eq!(cta.link, links.whatsapp_link());
    }

    #[test]
    fn test_personalised_welcome() {
        let profile = UserProfile::from_form("Budi", "PT X", None).unwrap();
        let msg = welcome_message(Some(&profile));
        assert!(msg.content.starts_with("Terima kasih, Budi dari PT X!"));
        assert_eq!(welcome_message(None).content, WELCOME_TEXT);
    }
}
