// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Function signature hygiene
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
// Test code may unwrap
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Human-in-the-loop anchor editing for reference/query single-cell
//! alignment.
//!
//! A model proposes *anchors*: groups of query cells that correspond to one
//! reference cluster. Polyphony fetches them per iteration, scores each one by
//! the overlap of its differential genes with its reference cluster's, and
//! lets the user confirm, delete, redraw or add anchors. Every accepted
//! change advances the iteration and triggers a fresh fetch.
//!
//! # Key entry points
//!
//! - [`session::AnchorSession`] - edit state machine and mutation protocol
//! - [`store::AnchorStore`] - per-iteration snapshot cache with in-flight
//!   request sharing
//! - [`gateway::AnchorGateway`] - the anchor/model service boundary
//! - [`views::DerivedViews`] - memoized scores, anchor-of-interest
//!   resolution and link geometry
//! - [`options::Options`] - runtime configuration
//!
//! # Architecture
//!
//! Requests run on named background threads (or inline, for the CLI and
//! tests). Their completions are delivered over a channel and applied by
//! [`session::AnchorSession::poll`] on the owning thread, once per frame.
//! Shared state lives in [`coordination::Coordination`]. Derived views key
//! their memos on the iterations and values they read, so they recompute
//! exactly when an input changes.

pub mod anchor;
pub mod columns;
pub mod coordination;
pub mod error;
pub mod gateway;
pub mod links;
pub mod options;
pub mod resolver;
pub mod scoring;
pub mod session;
pub mod store;
pub mod util;
pub mod views;
