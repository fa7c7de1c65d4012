// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU clients

use std::{borrow::Cow, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use crate::{frame::*, slave::*, Error, Result};

pub mod rtu;

#[cfg(feature = "sync")]
pub mod sync;

/// Maximum number of coils or discrete inputs per read request.
pub const MAX_READ_COILS: Quantity = 2000;

/// Maximum number of registers per read request.
pub const MAX_READ_REGISTERS: Quantity = 125;

/// Maximum number of coils per write request.
pub const MAX_WRITE_COILS: Quantity = 1968;

/// Maximum number of registers per write request.
pub const MAX_WRITE_REGISTERS: Quantity = 123;

/// Asynchronous client trait
#[async_trait]
pub trait Client: SlaveContext + Send + Debug {
    /// Invokes a _Modbus_ function.
    async fn call(&mut self, request: Request<'_>) -> Result<Response>;

    /// Discards all pending input on the line.
    ///
    /// Returns the number of dropped bytes.
    async fn flush(&mut self) -> Result<usize>;

    /// Disconnects the client.
    ///
    /// Permanently disconnects the client by shutting down the
    /// underlying stream in a graceful manner (`AsyncDrop`).
    ///
    /// Dropping the client without explicitly disconnecting it
    /// beforehand should also work and free all resources.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Asynchronous _Modbus_ reader
#[async_trait]
pub trait Reader: Client {
    /// Read multiple coils (0x01)
    async fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read multiple discrete inputs (0x02)
    async fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read multiple holding registers (0x03)
    async fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;

    /// Read multiple input registers (0x04)
    async fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;
}

/// Asynchronous Modbus writer
#[async_trait]
pub trait Writer: Client {
    /// Write a single coil (0x05)
    async fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()>;

    /// Write a single holding register (0x06)
    async fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()>;

    /// Write multiple coils (0x0F)
    ///
    /// Returns the number of coils the slave confirmed.
    async fn write_multiple_coils(
        &mut self,
        addr: Address,
        coils: &'_ [Coil],
    ) -> Result<Quantity>;

    /// Write multiple holding registers (0x10)
    ///
    /// Returns the number of registers the slave confirmed.
    async fn write_multiple_registers(
        &mut self,
        addr: Address,
        words: &[Word],
    ) -> Result<Quantity>;
}

/// Checks a request against the protocol limits before anything is sent.
pub(crate) fn validate_request(slave: Slave, request: &Request<'_>) -> Result<()> {
    use crate::frame::Request::*;

    if slave.is_reserved() {
        return Err(Error::InvalidArgument(format!(
            "slave address {slave} is reserved"
        )));
    }
    if slave.is_broadcast() && !request.is_write() {
        return Err(Error::InvalidArgument(format!(
            "{} cannot be broadcast",
            request.function_code()
        )));
    }
    let max_quantity = match request {
        ReadCoils(_, _) | ReadDiscreteInputs(_, _) => MAX_READ_COILS,
        ReadInputRegisters(_, _) | ReadHoldingRegisters(_, _) => MAX_READ_REGISTERS,
        WriteMultipleCoils(_, _) => MAX_WRITE_COILS,
        WriteMultipleRegisters(_, _) => MAX_WRITE_REGISTERS,
        WriteSingleCoil(_, _) | WriteSingleRegister(_, _) => 1,
    };
    let quantity = request.quantity();
    if quantity == 0 || quantity > max_quantity.into() {
        return Err(Error::InvalidArgument(format!(
            "quantity {quantity} out of range 1..={max_quantity} for function {}",
            request.function_code()
        )));
    }
    let end = usize::from(request.address()) + quantity;
    if end > 0x10000 {
        return Err(Error::InvalidArgument(format!(
            "address range 0x{:0>4X} + {quantity} exceeds 0xFFFF",
            request.address()
        )));
    }
    Ok(())
}

/// Asynchronous Modbus client context
#[derive(Debug)]
pub struct Context {
    client: Box<dyn Client>,
}

impl From<Box<dyn Client>> for Context {
    fn from(client: Box<dyn Client>) -> Self {
        Self { client }
    }
}

impl From<Context> for Box<dyn Client> {
    fn from(val: Context) -> Self {
        val.client
    }
}

impl Context {
    /// Discards all pending input on the line.
    pub async fn flush(&mut self) -> Result<usize> {
        self.client.flush().await
    }

    /// Turns the context into a handle that can be cloned and shared
    /// between tasks.
    #[must_use]
    pub fn into_shared(self) -> SharedContext {
        SharedContext::new(self)
    }
}

#[async_trait]
impl Client for Context {
    async fn call(&mut self, request: Request<'_>) -> Result<Response> {
        self.client.call(request).await
    }

    async fn flush(&mut self) -> Result<usize> {
        self.client.flush().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.client.disconnect().await
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) {
        self.client.set_slave(slave);
    }
}

#[async_trait]
impl Reader for Context {
    async fn read_coils<'a>(&'a mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        self.client
            .call(Request::ReadCoils(addr, cnt))
            .await
            .map(|response| match response {
                Response::ReadCoils(mut coils) => {
                    debug_assert!(coils.len() >= cnt.into());
                    coils.truncate(cnt.into());
                    coils
                }
                _ => unreachable!("call() should reject mismatching responses"),
            })
    }

    async fn read_discrete_inputs<'a>(
        &'a mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Coil>> {
        self.client
            .call(Request::ReadDiscreteInputs(addr, cnt))
            .await
            .map(|response| match response {
                Response::ReadDiscreteInputs(mut coils) => {
                    debug_assert!(coils.len() >= cnt.into());
                    coils.truncate(cnt.into());
                    coils
                }
                _ => unreachable!("call() should reject mismatching responses"),
            })
    }

    async fn read_input_registers<'a>(
        &'a mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Word>> {
        self.client
            .call(Request::ReadInputRegisters(addr, cnt))
            .await
            .map(|response| match response {
                Response::ReadInputRegisters(words) => {
                    debug_assert_eq!(words.len(), cnt.into());
                    words
                }
                _ => unreachable!("call() should reject mismatching responses"),
            })
    }

    async fn read_holding_registers<'a>(
        &'a mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Word>> {
        self.client
            .call(Request::ReadHoldingRegisters(addr, cnt))
            .await
            .map(|response| match response {
                Response::ReadHoldingRegisters(words) => {
                    debug_assert_eq!(words.len(), cnt.into());
                    words
                }
                _ => unreachable!("call() should reject mismatching responses"),
            })
    }
}

#[async_trait]
impl Writer for Context {
    async fn write_single_coil<'a>(&'a mut self, addr: Address, coil: Coil) -> Result<()> {
        self.client
            .call(Request::WriteSingleCoil(addr, coil))
            .await
            .map(|response| match response {
                Response::WriteSingleCoil(rsp_addr, rsp_coil) => {
                    debug_assert_eq!(addr, rsp_addr);
                    debug_assert_eq!(coil, rsp_coil);
                }
                _ => unreachable!("call() should reject mismatching responses"),
            })
    }

    async fn write_multiple_coils<'a>(
        &'a mut self,
        addr: Address,
        coils: &[Coil],
    ) -> Result<Quantity> {
        let cnt = coils.len();
        self.client
            .call(Request::WriteMultipleCoils(addr, Cow::Borrowed(coils)))
            .await
            .map(|response| match response {
                Response::WriteMultipleCoils(rsp_addr, rsp_cnt) => {
                    debug_assert_eq!(addr, rsp_addr);
                    debug_assert_eq!(cnt, rsp_cnt.into());
                    rsp_cnt
                }
                _ => unreachable!("call() should reject mismatching responses"),
            })
    }

    async fn write_single_register<'a>(&'a mut self, addr: Address, word: Word) -> Result<()> {
        self.client
            .call(Request::WriteSingleRegister(addr, word))
            .await
            .map(|response| match response {
                Response::WriteSingleRegister(rsp_addr, rsp_word) => {
                    debug_assert_eq!(addr, rsp_addr);
                    debug_assert_eq!(word, rsp_word);
                }
                _ => unreachable!("call() should reject mismatching responses"),
            })
    }

    async fn write_multiple_registers<'a>(
        &'a mut self,
        addr: Address,
        data: &[Word],
    ) -> Result<Quantity> {
        let cnt = data.len();
        self.client
            .call(Request::WriteMultipleRegisters(addr, Cow::Borrowed(data)))
            .await
            .map(|response| match response {
                Response::WriteMultipleRegisters(rsp_addr, rsp_cnt) => {
                    debug_assert_eq!(addr, rsp_addr);
                    debug_assert_eq!(cnt, rsp_cnt.into());
                    rsp_cnt
                }
                _ => unreachable!("call() should reject mismatching responses"),
            })
    }
}

/// A [`Context`] that can be shared between tasks.
///
/// Every handle may address its own slave. The underlying context is
/// locked for the whole duration of a transaction, so that concurrent
/// requests are serialized on the line.
#[derive(Debug, Clone)]
pub struct SharedContext {
    context: Arc<Mutex<Context>>,
    slave: Option<Slave>,
}

impl SharedContext {
    #[must_use]
    pub fn new(context: Context) -> Self {
        Self {
            context: Arc::new(Mutex::new(context)),
            slave: None,
        }
    }

    /// Exclusive access to the shared context, e.g. for a sequence
    /// of requests that must not be interleaved with others.
    ///
    /// The slave of this handle is applied to the locked context.
    pub async fn lock(&self) -> MutexGuard<'_, Context> {
        let mut context = self.context.lock().await;
        if let Some(slave) = self.slave {
            context.set_slave(slave);
        }
        context
    }
}

impl SlaveContext for SharedContext {
    fn set_slave(&mut self, slave: Slave) {
        self.slave = Some(slave);
    }
}

#[async_trait]
impl Client for SharedContext {
    async fn call(&mut self, request: Request<'_>) -> Result<Response> {
        self.lock().await.call(request).await
    }

    async fn flush(&mut self) -> Result<usize> {
        self.lock().await.flush().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.lock().await.disconnect().await
    }
}

#[async_trait]
impl Reader for SharedContext {
    async fn read_coils<'a>(&'a mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        self.lock().await.read_coils(addr, cnt).await
    }

    async fn read_discrete_inputs<'a>(
        &'a mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Coil>> {
        self.lock().await.read_discrete_inputs(addr, cnt).await
    }

    async fn read_input_registers<'a>(
        &'a mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Word>> {
        self.lock().await.read_input_registers(addr, cnt).await
    }

    async fn read_holding_registers<'a>(
        &'a mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Word>> {
        self.lock().await.read_holding_registers(addr, cnt).await
    }
}

#[async_trait]
impl Writer for SharedContext {
    async fn write_single_coil<'a>(&'a mut self, addr: Address, coil: Coil) -> Result<()> {
        self.lock().await.write_single_coil(addr, coil).await
    }

    async fn write_multiple_coils<'a>(
        &'a mut self,
        addr: Address,
        coils: &[Coil],
    ) -> Result<Quantity> {
        self.lock().await.write_multiple_coils(addr, coils).await
    }

    async fn write_single_register<'a>(&'a mut self, addr: Address, word: Word) -> Result<()> {
        self.lock().await.write_single_register(addr, word).await
    }

    async fn write_multiple_registers<'a>(
        &'a mut self,
        addr: Address,
        data: &[Word],
    ) -> Result<Quantity> {
        self.lock().await.write_multiple_registers(addr, data).await
    }
}
