mod delivery;

pub use delivery::{deliver, ConsoleSender, ReportSender, WebhookSender};
