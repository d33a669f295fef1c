//! Core module containing the terminal pipeline
//!
//! This module provides:
//! - Byte decoding to the display radices and text encodings
//! - Line assembly on a configurable EOL sequence
//! - Tx, Bidir and Rx line repositories with counters and rates
//! - AutoAction and AutoResponse trigger engines
//! - Flow control signal tracking and connect time
//! - The per-terminal worker, its event stream and the terminal handle
//! - Transports (TCP, in-memory loopback)

pub mod assembler;
pub mod codec;
pub mod connect_time;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod flow;
pub mod line;
pub mod pipeline;
pub mod repository;
pub mod settings;
pub mod terminal;
pub mod transport;
pub mod trigger;
