//! Twitter MCP gateway: exposes Twitter/X web operations as MCP tools,
//! reusing one authenticated upstream session per credential pair.

pub mod cli;
pub mod clients;
pub mod core;
pub mod domain;
pub mod infra;
pub mod session;
pub mod tools;
