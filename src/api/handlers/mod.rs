mod status;
mod webhook;

pub use status::{health, status};
pub use webhook::{telegram_webhook, SECRET_HEADER};
