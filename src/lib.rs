//! # Financial Report Analyst
//!
//! Sends financial statements (PDF/CSV) to a hosted AI assistant, drives the
//! assistant's asynchronous thread/run workflow to completion and returns a
//! validated, structured report.
//!
//! ## Core Concepts
//!
//! - **Report Schema**: [`AnalysisResponse`] is both the validator for the
//!   assistant's answer and, through its generated JSON Schema, the contract
//!   the assistant is configured with.
//! - **Remote Job Client**: [`AssistantApi`] is the narrow seam over the
//!   remote service (upload, thread, message, run, cleanup).
//! - **Run Orchestrator**: [`RunOrchestrator`] polls a run until it settles
//!   and extracts the answer according to its [`OutputContract`].
//! - **Chat Session**: [`ChatSession`] keeps one thread alive across turns
//!   and answers in plain text.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use financial_report_analyst::*;
//!
//! let config = ServiceConfig::from_env()?;
//! let client = OpenAiClient::new(config.api_key.clone()).with_base_url(&config.base_url);
//! let orchestrator = RunOrchestrator::new(Arc::new(client), config.require_assistant_id()?)
//!     .with_poll_settings(config.poll.clone());
//!
//! let bytes = std::fs::read("orcamento_2023.csv")?;
//! let report = orchestrator
//!     .analyze_document(bytes, "orcamento_2023.csv", "text/csv", None)
//!     .await?;
//! println!("{}: {}", report.municipality_name, report.conclusion.text);
//! ```

pub mod assistant;
pub mod config;
pub mod error;
pub mod schema;
pub mod validation;

#[cfg(feature = "server")]
pub mod server;

pub use assistant::{
    AnalysisEvent, AssistantApi, AssistantSpec, ChatRole, ChatSession, ChatTurn, FunctionTool,
    OpenAiClient, OutputContract, RemoteDocument, Run, RunOrchestrator, RunOutput, RunStatus,
};
pub use config::{PollSettings, ServiceConfig};
pub use error::{AnalystError, Result};
pub use schema::*;
pub use validation::{validate, validate_str, ValidationError};
