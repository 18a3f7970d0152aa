//! These models represent the objects passed around by the orchestrator
//!
//! There are several different related formats we need to interact with:
//! - vercel useChat messages/tools, sent from the interface to the server
//! - vercel streaming protocol messages/tools, sent from the server to the interface
//! - openai messages/tools, sent from the orchestrator to the LLM
//!
//! These all overlap to varying degrees. We always immediately convert those data models
//! into the internal structs using to/from helpers. Because of the need for compatibility,
//! the internal models are not an exact match to any of these formats.
pub mod message;
pub mod role;
pub mod tool;
