//! Chat channel — inbound classification and outbound transport.

pub mod event;
pub mod telegram;
pub mod transport;

pub use event::{EventKind, InboundEvent, Update, classify, parse_update};
pub use telegram::TelegramChannel;
pub use transport::{Button, ChatTransport, Keyboard, MessageRef};
