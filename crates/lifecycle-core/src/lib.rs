//! Shared building blocks for the Gitee lifecycle bot.
//! This crate provides policy configuration, operate-log parsing, issue-hook
//! decoding, and comment rendering consumed by the runtime crate.

pub mod issue_comment;
pub mod issue_event;
pub mod operate_log;
pub mod policy_config;
