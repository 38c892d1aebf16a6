//! User-facing texts and keyboards.

use crate::channels::{Button, Keyboard};
use crate::llm::ReportDepth;

/// Button tags.
pub mod tags {
    pub const SHORT: &str = "short";
    pub const LONG: &str = "long";
    pub const START_DRAFT: &str = "start_email";
    pub const DISPATCH: &str = "dispatch";
    pub const ADD_IDENTITY: &str = "add_identity";
}

/// Names the drafted notification may be signed with.
pub const SIGNERS: &[&str] = &[
    "Alex Morgan",
    "Jordan Blake",
    "Sam Carter",
    "Taylor Brooks",
    "Riley Quinn",
    "Casey Jordan",
];

pub const WELCOME: &str = "👋 *Welcome!*\n\n\
    Send me a screenshot of a Telegram group and I'll analyze it.\n\
    I can write a quick or detailed *analysis report*, or draft a *takedown request* \
    and send it through every configured mailbox.\n\n\
    Use /cancel at any time to stop.";

pub const SCREENSHOT_SAVED: &str = "Screenshot saved ✅\nWhat should I do with it?";

pub const STEP_LINK: &str = "📝 *Step 1/3: Group link*\n\n\
    Send the *link* of the group you want to report.\n\
    (Example: https://t.me/scamgroup)";

pub const STEP_IDENTIFIER: &str = "✅ Link saved.\n\n\
    📝 *Step 2/3: Chat ID*\n\
    Send the *chat ID* of the group or scammer if you have it.\n\
    Otherwise just write 'Skip'.";

pub const STEP_REASON: &str = "✅ ID saved.\n\n\
    📝 *Step 3/3: Content & reason*\n\
    Why should it be taken down? Paste the scam message or describe it briefly.";

pub const DRAFTING: &str = "🤖 *Creating email draft…*";

pub const DISPATCH_STARTING: &str = "🚀 Starting dispatch…";

pub const SESSION_EXPIRED: &str = "❌ Your screenshot has expired. Please send it again.";

pub const DRAFT_MISSING: &str = "❌ No draft found. Send a screenshot and draft the email again.";

pub const IDENTITY_MISSING: &str =
    "❌ The mailbox address was lost. Press *Add identity* and start again.";

pub const GENERIC_FAILURE: &str = "⚠️ Something went wrong. Please try again.";

pub const NO_ACTIVE_STEP: &str = "🤔 No step is waiting for text right now.\n\
    Send a screenshot to begin, or use the buttons above.";

pub const CANCELLED: &str = "❌ Process cancelled.";

pub const UNKNOWN_COMMAND: &str = "Unknown command. Try /start or /cancel.";

pub const ASK_IDENTITY_ADDRESS: &str = "📧 *New identity*\n\nSend the mailbox address.";

pub const INVALID_IDENTITY_ADDRESS: &str =
    "That doesn't look like a mailbox address. Send something like name@example.com.";

pub const ASK_IDENTITY_SECRET: &str = "🔑 Now send the app password for this mailbox.\n\
    Spaces are removed automatically.";

pub const REMOVE_USAGE: &str = "Usage: /remove name@example.com";

pub fn generating(depth: ReportDepth) -> String {
    format!("⏳ Generating {} report…", depth.label())
}

pub fn report(text: &str) -> String {
    format!("✅ *Report:*\n\n{text}")
}

pub fn draft(target: &str, subject: &str, body: &str) -> String {
    format!("📧 *Generated email draft*\n\nTo: {target}\nSubject: {subject}\n\n{body}")
}

pub fn identity_saved(masked: &str, total: usize) -> String {
    format!("✅ Identity saved: {masked}\nConfigured identities: {total}")
}

pub fn admin_panel(total: usize) -> String {
    format!("🛠 *Admin panel*\n\nConfigured identities: {total}")
}

pub fn identity_list(masked: &[String]) -> String {
    if masked.is_empty() {
        return "No identities configured.".to_string();
    }
    let lines: Vec<String> = masked
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {m}", i + 1))
        .collect();
    format!("📋 *Identities*\n\n{}", lines.join("\n"))
}

pub fn identity_removed(masked: &str, existed: bool) -> String {
    if existed {
        format!("🗑 Removed {masked}")
    } else {
        format!("No identity {masked}")
    }
}

pub fn action_keyboard() -> Keyboard {
    Keyboard::new()
        .row(vec![
            Button::new("⚡ Short report", tags::SHORT),
            Button::new("📊 Long report", tags::LONG),
        ])
        .row(vec![Button::new("✉️ Draft takedown email", tags::START_DRAFT)])
}

pub fn dispatch_keyboard() -> Keyboard {
    Keyboard::new().row(vec![Button::new("🚀 Send from all identities", tags::DISPATCH)])
}

pub fn admin_keyboard() -> Keyboard {
    Keyboard::new().row(vec![Button::new("➕ Add identity", tags::ADD_IDENTITY)])
}
