//! Model access for the document QA backend: chat (full and streaming),
//! batched embeddings, reranking, health probes and log formatting.

pub mod chat;
pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use chat::{ChatMessage, ChatRole, ChatStream, RerankHit};
pub use config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
pub use error_handler::AiLlmError;
pub use health_service::HealthStatus;
pub use service_profiles::LlmServiceProfiles;
