pub mod bridge_status;
pub mod clear;
pub mod keys;
pub mod list;
pub mod show;
pub mod users;
