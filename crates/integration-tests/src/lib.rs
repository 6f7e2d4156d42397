//! End-to-end tests for the sotto PKG system.
//!
//! The [`harness`] module stands in for the deployment plumbing: it boots a
//! PKG on an ephemeral port and captures verification emails on a channel
//! instead of running an SMTP server.

pub mod harness;
