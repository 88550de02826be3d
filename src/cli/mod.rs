//! CLI infrastructure for the causal strategic simulator
//!
//! This module provides the command-line interface for running the
//! feature-drop sensitivity experiment and summarising its artifacts.

pub mod commands;
pub mod output;
