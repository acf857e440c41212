pub mod access;
pub mod auth;
pub mod boards;
pub mod config;
pub mod events;
pub mod members;
pub mod notifications;
pub mod ordering;
pub mod push;
pub mod sync_queue;
pub mod tasks;
