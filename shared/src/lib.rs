//! Re-exports the shared building blocks consumed by the scoring service:
//! configuration handling, error types, wire DTOs, the model registry and the
//! resilient OpenAI client.

pub mod config;
pub mod dto;
pub mod error;
pub mod openai_client;
pub mod openai_settings;
