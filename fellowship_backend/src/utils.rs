//! Shared helpers and constants.

use chrono::Utc;
use uuid::Uuid;

pub const APP_NAME: &str = "fellowship_backend";

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn print_banner() {
    println!("{APP_NAME} v{}", env!("CARGO_PKG_VERSION"));
}
