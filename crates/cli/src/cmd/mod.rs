pub mod after_push;
pub mod fetch_logs;
