// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fieldsync-relay: a minimal WebSocket relay for fieldsync clients.
//!
//! Every `data` frame is acknowledged to its sender and forwarded to the
//! other connected clients. `ping` is answered with `pong`, and frames that
//! fail to parse get an `error` reply carrying their `messageId` when one
//! can be recovered.

pub mod server;
pub mod state;

pub use server::{run, serve};
pub use state::RelayState;
