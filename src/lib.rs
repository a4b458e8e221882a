//! Server-side LLM agent that answers portfolio analytics questions over a
//! streamed, tool-calling conversation interface.
//!
//! See [`orchestrator::Orchestrator`] for the turn state machine,
//! [`tool_registry::ToolRegistry`] for the closed set of six data tools,
//! and [`server::build_router`] for the HTTP surface.

pub mod auth;
pub mod cache;
pub mod config;
pub mod conversation_store;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod raw_data_client;
pub mod server;
pub mod stream_writer;
pub mod tool_registry;
pub mod tools;
