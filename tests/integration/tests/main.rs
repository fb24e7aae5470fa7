//! End-to-End Integration Tests
//!
//! These tests drive the complete SAML service provider in-process against
//! a simulated identity provider.

mod common;
mod endpoints;
mod login_flow;
mod logout_flow;
mod wrapping;
