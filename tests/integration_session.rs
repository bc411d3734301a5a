//! Integration tests for a full playground session: store, command host,
//! adapters, terminal and widgets driven through the public API.

#[path = "integration_session/mod.rs"]
mod suite;
