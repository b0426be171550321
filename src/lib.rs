pub mod alert_log;
pub mod config;
pub mod cooldown;
pub mod dedup;
pub mod dispatch;
pub mod event;
pub mod monitor;
pub mod webfleet;
