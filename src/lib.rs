//! A hierarchical multi-agent task orchestrator that turns research papers into verified
//! LinkedIn posts, with durable Redis-backed progress tracking and bounded concurrency.

pub mod agent_runtime;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod error;
pub mod governor;
pub mod meta_graph;
pub mod progress_tracker;
pub mod roles;
pub mod server;
pub mod task;
pub mod task_store;
pub mod team_graph;
pub mod tool_protocol;
pub mod tools;

pub use client_wrapper::{ClientWrapper, Message, Role};
pub use error::{ErrorKind, OrchestratorError};
pub use task::Task;
