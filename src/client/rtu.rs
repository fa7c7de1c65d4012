// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting a Modbus RTU context

use std::{fmt, io};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{validate_request, Context};

use crate::{
    channel::Channel, config::TransactionConfig, transaction::Engine, Request, Response, Result,
    Slave, SlaveContext,
};

#[cfg(feature = "serial")]
use crate::config::Config;

/// Attach a new client context to a direct transport connection,
/// addressing no particular slave (broadcast).
pub fn attach<T>(transport: T) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    attach_slave(transport, Slave::broadcast())
}

/// Attach a new client context to a transport connection with the
/// default transaction settings.
pub fn attach_slave<T>(transport: T, slave: Slave) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    attach_slave_with_config(transport, slave, TransactionConfig::default())
}

/// Attach a new client context to a transport connection.
pub fn attach_slave_with_config<T>(transport: T, slave: Slave, config: TransactionConfig) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    let engine = Engine::new(Channel::new(transport), config);
    let client = Client::new(engine, slave);
    Context {
        client: Box::new(client),
    }
}

/// Open the serial port and address no particular slave (broadcast).
#[cfg(feature = "serial")]
pub async fn connect(config: &Config) -> Result<Context> {
    connect_slave(config, Slave::broadcast()).await
}

/// Open the serial port and address a single slave.
///
/// Input that is pending on the line after opening is discarded.
#[cfg(feature = "serial")]
pub async fn connect_slave(config: &Config, slave: Slave) -> Result<Context> {
    let channel = Channel::open(&config.serial)?;
    let engine = Engine::new(channel, config.transaction_config());
    let mut client = Client::new(engine, slave);
    client.flush().await?;
    Ok(Context {
        client: Box::new(client),
    })
}

/// Modbus RTU client
#[derive(Debug)]
pub(crate) struct Client<T> {
    engine: Option<Engine<T>>,
    slave: Slave,
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(engine: Engine<T>, slave: Slave) -> Self {
        Self {
            engine: Some(engine),
            slave,
        }
    }

    fn engine(&mut self) -> io::Result<&mut Engine<T>> {
        self.engine
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "disconnected"))
    }

    async fn call(&mut self, request: Request<'_>) -> Result<Response> {
        validate_request(self.slave, &request)?;
        let slave = self.slave;
        self.engine()?.execute(slave, &request).await
    }

    async fn flush(&mut self) -> Result<usize> {
        self.engine()?.flush().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(engine) = self.engine.take() else {
            return Ok(());
        };
        log::debug!("Disconnecting");
        engine.close().await
    }
}

impl<T> SlaveContext for Client<T> {
    fn set_slave(&mut self, slave: Slave) {
        self.slave = slave;
    }
}

#[async_trait]
impl<T> crate::client::Client for Client<T>
where
    T: fmt::Debug + AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn call(&mut self, request: Request<'_>) -> Result<Response> {
        self.call(request).await
    }

    async fn flush(&mut self) -> Result<usize> {
        self.flush().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.disconnect().await
    }
}
