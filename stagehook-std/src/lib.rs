//! # stagehook-std
//!
//! The hook execution engine of Stagehook.
//!
//! This crate provides:
//! - **Invocation**: [`invoker`] runs one hook under a time budget
//! - **Stage execution**: [`stage::StageExecutor`] runs groups, applies updates in
//!   static order and honors rejects; [`executor::HookStageExecutor`] exposes
//!   one entry point per stage
//! - **Request flow**: [`orchestrator::RequestOrchestrator`] drives every stage
//!   around an [`auction::Auction`]
//! - **State**: [`context::HookExecutionContext`] and [`module_context::ModuleContexts`]
//! - **Configuration**: [`plan::ExecutionPlan`] and [`registry::HookRegistry`]
//! - **Observability**: [`outcome`] records and the [`trace`] renderer

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use stagehook_core;

// Modules
pub mod auction;
pub mod context;
pub mod executor;
pub mod invoker;
pub mod module_context;
pub mod orchestrator;
pub mod outcome;
pub mod pipeline;
pub mod plan;
pub mod registry;
pub mod stage;
pub mod testing;
pub mod trace;
