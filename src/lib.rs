//! # pixelpipe
//!
//! Image metadata, statistics and multi-step transformations, callable by
//! action name. Inputs come from a local path, a live byte stream, or a remote
//! HTTP(S) resource. Output is either the encoded image as a stream or the
//! result of writing it to a file.
//!
//! # Architecture: Resolve, then Inspect or Pipe
//!
//! ```text
//! request ──▶ resolve source ──▶ drain ──▶ engine.metadata / engine.stats
//!                    │
//!                    └─────────▶ build pipeline ──▶ pipe ──▶ byte stream | file info
//! ```
//!
//! Every invocation is independent: nothing is cached between calls and every
//! stream handle is owned by exactly one stage at a time, so an early failure
//! drops (and closes) it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Source descriptors and their resolution into one byte stream |
//! | [`fetch`] | Remote fetch seam and the `reqwest` implementation |
//! | [`materialize`] | Drains a stream into one contiguous buffer |
//! | [`steps`] | Wire shape of `meta.steps` |
//! | [`pipeline`] | Builds typed operations from steps and pipes input through the engine |
//! | [`imaging`] | Engine trait, operation registry, and the `image`-crate engine |
//! | [`service`] | The `metadata`, `stats` and `process` actions plus by-name dispatch |
//! | [`gateway`] | axum HTTP routes over the action layer |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`error`] | Acquisition and service error types |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Classify Sources Once
//!
//! A source is turned into a [`source::SourceDescriptor`] when it enters the
//! service. Values that describe neither a path nor a remote resource fail
//! right there with [`error::AcquisitionError`], so the resolver only ever
//! sees well-formed descriptors.
//!
//! ## Synchronous Engine, Async Service
//!
//! [`imaging::ImageEngine`] is a plain synchronous trait. The service runs
//! engine calls with `tokio::task::spawn_blocking`, keeping CPU-heavy
//! decoding off the async workers, and tests swap in a recording mock.
//!
//! ## Explicit Terminal Writes
//!
//! `toFile` is handled by the pipeline builder, not the engine registry. A
//! built pipeline is either a stream pipeline or a file pipeline with its list
//! of targets, and every target is written with the full operation list.

pub mod config;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod imaging;
pub mod materialize;
pub mod output;
pub mod pipeline;
pub mod service;
pub mod source;
pub mod steps;

#[cfg(test)]
pub(crate) mod test_helpers;
