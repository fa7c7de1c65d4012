// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A pure [Rust](https://www.rust-lang.org)
//! [Modbus RTU](https://en.wikipedia.org/wiki/Modbus) client library
//! based on [tokio](https://tokio.rs).
//!
//! Modbus is based on a [master/slave](https://en.wikipedia.org/wiki/Master/slave_(technology))
//! model. This crate implements the master side of a serial line:
//! it frames requests, guards them with a CRC16, sends them over a
//! half-duplex channel and retries transactions that got lost or
//! corrupted on the wire.
//!
//! ## Layers
//!
//! - [`codec`]: CRC16 and RTU frame encoding/decoding
//! - [`channel`]: byte transport with inter-frame silence detection
//! - [`transaction`]: request/response state machine with retries
//! - [`client`]: typed register/coil operations
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "serial")]
//! # async fn run() -> tokio_modbus_rtu::Result<()> {
//! use tokio_modbus_rtu::prelude::*;
//!
//! let config = Config::new("/dev/ttyUSB0").with_baud_rate(19200);
//! let mut ctx = rtu::connect_slave(&config, Slave(0x01)).await?;
//! let words = ctx.read_holding_registers(0x0000, 2).await?;
//! println!("{words:?}");
//! ctx.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

pub mod prelude;

pub mod channel;
pub mod client;
pub mod codec;
pub mod config;
pub mod transaction;

mod error;
pub use self::error::{DecodeError, Error, TransactionContext};

mod frame;
pub use self::frame::{
    rtu::Frame, Address, Coil, ExceptionCode, ExceptionResponse, FunctionCode, Quantity,
    Request, Response, Word,
};

mod slave;
pub use self::slave::{Slave, SlaveContext, SlaveId};

/// Specialized [`std::result::Result`] type for Modbus RTU client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
pub(crate) mod mock;
