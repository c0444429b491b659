//! Interview Coach: onboarding wizard engine and prep-plan generator.

pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod onboarding;
pub mod plan;
pub mod registry;
pub mod store;
