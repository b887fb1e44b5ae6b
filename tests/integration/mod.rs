//! Integration tests for kernel-replay
//!
//! These tests verify that multiple components work together correctly.

#[path = "../common/mod.rs"]
pub mod common;

pub mod replay_flow;
