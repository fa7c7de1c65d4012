// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A simulated slave device on an in-memory serial line.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::{
    io::{duplex, AsyncReadExt as _, AsyncWriteExt as _, DuplexStream},
    task::JoinHandle,
};
use tokio_modbus_rtu::{codec, ExceptionCode, FunctionCode, Slave};

/// Reply of a simulated slave to a single request.
pub enum Reply {
    /// Response payload following the function code.
    Data(Vec<u8>),
    Exception(ExceptionCode),
    Silence,
}

pub trait Handler: Send + 'static {
    fn handle(&mut self, function: FunctionCode, payload: &[u8]) -> Reply;
}

/// Answers every request with a function specific exception.
pub struct ExceptionHandler;

impl Handler for ExceptionHandler {
    fn handle(&mut self, function: FunctionCode, _: &[u8]) -> Reply {
        use FunctionCode::*;

        let exception = match function {
            ReadCoils => ExceptionCode::Acknowledge,
            ReadDiscreteInputs => ExceptionCode::GatewayPathUnavailable,
            WriteSingleCoil => ExceptionCode::GatewayTargetDevice,
            WriteMultipleCoils => ExceptionCode::IllegalDataAddress,
            ReadInputRegisters => ExceptionCode::IllegalDataValue,
            ReadHoldingRegisters => ExceptionCode::IllegalFunction,
            WriteSingleRegister => ExceptionCode::MemoryParityError,
            WriteMultipleRegisters => ExceptionCode::ServerDeviceBusy,
            Custom(_) => ExceptionCode::IllegalFunction,
        };
        Reply::Exception(exception)
    }
}

fn read_u16(payload: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([payload[offset], payload[offset + 1]])
}

fn pack_coils(coils: &[bool]) -> Vec<u8> {
    let mut packed = vec![0; coils.len().div_ceil(8)];
    for (i, coil) in coils.iter().enumerate() {
        packed[i / 8] |= u8::from(*coil) << (i % 8);
    }
    packed
}

/// Coils and registers in memory.
///
/// Discrete inputs mirror the coils, input registers mirror the
/// holding registers.
pub struct RegisterMap {
    pub coils: Vec<bool>,
    pub registers: Vec<u16>,
}

impl RegisterMap {
    pub fn new(size: usize) -> Self {
        Self {
            coils: vec![false; size],
            registers: vec![0; size],
        }
    }

    fn range(&self, addr: u16, cnt: usize, size: usize) -> Result<std::ops::Range<usize>, ExceptionCode> {
        let start = usize::from(addr);
        let end = start + cnt;
        if end > size {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        Ok(start..end)
    }

    fn try_handle(&mut self, function: FunctionCode, payload: &[u8]) -> Result<Vec<u8>, ExceptionCode> {
        use FunctionCode::*;

        let addr = read_u16(payload, 0);
        match function {
            ReadCoils | ReadDiscreteInputs => {
                let cnt = read_u16(payload, 2).into();
                let range = self.range(addr, cnt, self.coils.len())?;
                let packed = pack_coils(&self.coils[range]);
                let mut data = vec![packed.len() as u8];
                data.extend(packed);
                Ok(data)
            }
            ReadHoldingRegisters | ReadInputRegisters => {
                let cnt = read_u16(payload, 2).into();
                let range = self.range(addr, cnt, self.registers.len())?;
                let mut data = vec![(cnt * 2) as u8];
                for word in &self.registers[range] {
                    data.extend(word.to_be_bytes());
                }
                Ok(data)
            }
            WriteSingleCoil => {
                let range = self.range(addr, 1, self.coils.len())?;
                self.coils[range.start] = read_u16(payload, 2) == 0xFF00;
                Ok(payload.to_vec())
            }
            WriteSingleRegister => {
                let range = self.range(addr, 1, self.registers.len())?;
                self.registers[range.start] = read_u16(payload, 2);
                Ok(payload.to_vec())
            }
            WriteMultipleCoils => {
                let cnt = read_u16(payload, 2).into();
                let range = self.range(addr, cnt, self.coils.len())?;
                let packed = &payload[5..];
                for (i, coil) in self.coils[range].iter_mut().enumerate() {
                    *coil = (packed[i / 8] >> (i % 8)) & 1 == 1;
                }
                Ok(payload[..4].to_vec())
            }
            WriteMultipleRegisters => {
                let cnt = read_u16(payload, 2).into();
                let range = self.range(addr, cnt, self.registers.len())?;
                for (i, word) in self.registers[range].iter_mut().enumerate() {
                    *word = read_u16(payload, 5 + i * 2);
                }
                Ok(payload[..4].to_vec())
            }
            Custom(_) => Err(ExceptionCode::IllegalFunction),
        }
    }
}

impl Handler for RegisterMap {
    fn handle(&mut self, function: FunctionCode, payload: &[u8]) -> Reply {
        match self.try_handle(function, payload) {
            Ok(data) => Reply::Data(data),
            Err(exception) => Reply::Exception(exception),
        }
    }
}

/// Ignores the first `drop` requests, e.g. due to noise on the line.
pub struct Flaky<H> {
    pub inner: H,
    pub drop: usize,
}

impl<H: Handler> Handler for Flaky<H> {
    fn handle(&mut self, function: FunctionCode, payload: &[u8]) -> Reply {
        if self.drop > 0 {
            self.drop -= 1;
            return Reply::Silence;
        }
        self.inner.handle(function, payload)
    }
}

/// A running simulated slave.
pub struct SlaveDevice {
    /// Number of valid frames received, including broadcasts and
    /// frames for other slaves.
    pub received: Arc<AtomicUsize>,
    pub task: JoinHandle<()>,
}

impl SlaveDevice {
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

/// Connects a simulated slave to the returned end of the line.
pub fn spawn_slave(slave: Slave, mut handler: impl Handler) -> (DuplexStream, SlaveDevice) {
    let (client, mut line) = duplex(1024);
    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    let task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let mut chunk = [0; 256];
        loop {
            let len = match line.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(len) => len,
            };
            buf.extend_from_slice(&chunk[..len]);
            let frame = match codec::rtu::decode(&buf) {
                Ok(frame) => frame,
                Err(_) if buf.len() < 256 => continue,
                Err(_) => {
                    buf.clear();
                    continue;
                }
            };
            buf.clear();
            counter.fetch_add(1, Ordering::SeqCst);
            if frame.slave != slave && !frame.slave.is_broadcast() {
                continue;
            }
            let reply = handler.handle(FunctionCode::new(frame.function), &frame.payload);
            if frame.slave.is_broadcast() {
                continue;
            }
            let adu = match reply {
                Reply::Data(data) => codec::rtu::encode(slave, frame.function, &data),
                Reply::Exception(exception) => {
                    codec::rtu::encode(slave, frame.function | 0x80, &[u8::from(exception)])
                }
                Reply::Silence => continue,
            };
            if line.write_all(&adu).await.is_err() {
                break;
            }
        }
    });
    (client, SlaveDevice { received, task })
}
