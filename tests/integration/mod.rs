//! Integration tests module
//!
//! This module organizes all integration tests for the serene-player application.

pub mod controller_test;
pub mod player_test;
