// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting a synchronous Modbus RTU context

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};

use super::{new_runtime, Context};

use crate::{client::rtu as async_rtu, config::TransactionConfig, Result, Slave};

#[cfg(feature = "serial")]
use crate::config::Config;

/// Open the serial port and address no particular slave (broadcast).
#[cfg(feature = "serial")]
pub fn connect(config: &Config) -> Result<Context> {
    connect_slave(config, Slave::broadcast())
}

/// Open the serial port and address a single slave.
#[cfg(feature = "serial")]
pub fn connect_slave(config: &Config, slave: Slave) -> Result<Context> {
    let runtime = new_runtime()?;
    // The serial port registers itself with the runtime that opens it.
    let async_ctx = runtime.block_on(async_rtu::connect_slave(config, slave))?;
    Ok(Context { runtime, async_ctx })
}

/// Attach a synchronous client context to a transport connection.
pub fn attach_slave_with_config<T>(
    transport: T,
    slave: Slave,
    config: TransactionConfig,
) -> Result<Context>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    let runtime = new_runtime()?;
    let async_ctx = async_rtu::attach_slave_with_config(transport, slave, config);
    Ok(Context { runtime, async_ctx })
}
