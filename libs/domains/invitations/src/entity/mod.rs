//! SeaORM entities for the tables the invitation pipeline reads and writes.

pub mod contact_list;
pub mod contact_list_member;
pub mod notification;
pub mod pending_action;
pub mod thread;
pub mod thread_invite;
pub mod thread_slot;
pub mod user;
