/// Chat identity, kept in the textual form it is persisted in
pub type ChatId = String;

/// Record key holding the comma-joined subscriber list
pub const SUBSCRIBERS_KEY: &str = "chat_ids";

/// Record key holding the comma-joined allow-list
pub const ALLOWLIST_KEY: &str = "auth_ids";
