// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encoding and decoding of Modbus PDUs and RTU frames.

use std::io::{self, BufRead as _, Cursor, Error, ErrorKind};

use byteorder::{BigEndian, ReadBytesExt as _};
use bytes::{BufMut as _, BytesMut};

use crate::{
    frame::{Coil, Quantity, EXCEPTION_BIT},
    ExceptionCode, ExceptionResponse, FunctionCode, Request, Response,
};

pub mod crc;
pub mod rtu;

/// Maximum request/response PDU size.
///
/// An RTU ADU is limited to 256 bytes: 1 byte address, 253 bytes PDU
/// and 2 bytes CRC.
pub const MAX_PDU_SIZE: usize = 253;

#[allow(clippy::cast_possible_truncation)]
fn u16_len(len: usize) -> u16 {
    // This type conversion should always be safe, because either
    // the caller is responsible to pass a valid usize or the
    // possible values are limited by the protocol.
    debug_assert!(len <= u16::MAX.into());
    len as u16
}

#[allow(clippy::cast_possible_truncation)]
fn u8_len(len: usize) -> u8 {
    // This type conversion should always be safe, because either
    // the caller is responsible to pass a valid usize or the
    // possible values are limited by the protocol.
    debug_assert!(len <= u8::MAX.into());
    len as u8
}

pub(crate) fn encode_request_pdu(buf: &mut BytesMut, request: &Request<'_>) {
    use crate::frame::Request::*;
    buf.put_u8(request.function_code().value());
    match request {
        ReadCoils(address, quantity)
        | ReadDiscreteInputs(address, quantity)
        | ReadInputRegisters(address, quantity)
        | ReadHoldingRegisters(address, quantity) => {
            buf.put_u16(*address);
            buf.put_u16(*quantity);
        }
        WriteSingleCoil(address, state) => {
            buf.put_u16(*address);
            buf.put_u16(bool_to_coil(*state));
        }
        WriteMultipleCoils(address, coils) => {
            buf.put_u16(*address);
            buf.put_u16(u16_len(coils.len()));
            buf.put_u8(u8_len(packed_coils_size(coils)));
            encode_packed_coils(buf, coils);
        }
        WriteSingleRegister(address, word) => {
            buf.put_u16(*address);
            buf.put_u16(*word);
        }
        WriteMultipleRegisters(address, words) => {
            buf.put_u16(*address);
            let len = words.len();
            buf.put_u16(u16_len(len));
            buf.put_u8(u8_len(len * 2));
            for w in words.as_ref() {
                buf.put_u16(*w);
            }
        }
    }
}

fn read_u16_be(reader: &mut impl io::Read) -> io::Result<u16> {
    reader.read_u16::<BigEndian>()
}

fn read_registers(rdr: &mut Cursor<&[u8]>) -> io::Result<Vec<u16>> {
    let byte_count = rdr.read_u8()?;
    if byte_count % 2 != 0 {
        return Err(Error::new(ErrorKind::InvalidData, "odd register byte count"));
    }
    let quantity = byte_count / 2;
    let mut data = Vec::with_capacity(quantity.into());
    for _ in 0..quantity {
        data.push(read_u16_be(rdr)?);
    }
    Ok(data)
}

fn read_packed_coils(rdr: &mut Cursor<&[u8]>) -> io::Result<Vec<Coil>> {
    let byte_count = usize::from(rdr.read_u8()?);
    let offset = usize::try_from(rdr.position()).map_err(|_| ErrorKind::InvalidData)?;
    let bytes = *rdr.get_ref();
    let Some(packed_coils) = bytes.get(offset..offset + byte_count) else {
        return Err(Error::new(ErrorKind::InvalidData, "too short"));
    };
    rdr.consume(byte_count);
    // Here we have no information about the exact requested quantity so we just
    // unpack the whole byte.
    let quantity = u16_len(byte_count * 8);
    Ok(decode_packed_coils(packed_coils, quantity))
}

/// Decodes the PDU of a regular (non-exception) response.
///
/// Fails if the function code is unknown, data is missing or bytes
/// remain after decoding.
pub fn decode_response_pdu(function: u8, payload: &[u8]) -> io::Result<Response> {
    use crate::frame::Response::*;
    if payload.len() + 1 > MAX_PDU_SIZE {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "response PDU size exceeded",
        ));
    }
    let rdr = &mut Cursor::new(payload);
    let rsp = match FunctionCode::new(function) {
        FunctionCode::ReadCoils => ReadCoils(read_packed_coils(rdr)?),
        FunctionCode::ReadDiscreteInputs => ReadDiscreteInputs(read_packed_coils(rdr)?),
        FunctionCode::WriteSingleCoil => {
            WriteSingleCoil(read_u16_be(rdr)?, coil_to_bool(read_u16_be(rdr)?)?)
        }
        FunctionCode::WriteMultipleCoils => WriteMultipleCoils(read_u16_be(rdr)?, read_u16_be(rdr)?),
        FunctionCode::ReadInputRegisters => ReadInputRegisters(read_registers(rdr)?),
        FunctionCode::ReadHoldingRegisters => ReadHoldingRegisters(read_registers(rdr)?),
        FunctionCode::WriteSingleRegister => {
            WriteSingleRegister(read_u16_be(rdr)?, read_u16_be(rdr)?)
        }
        FunctionCode::WriteMultipleRegisters => {
            WriteMultipleRegisters(read_u16_be(rdr)?, read_u16_be(rdr)?)
        }
        FunctionCode::Custom(code) => {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("unsupported function code: 0x{code:02X}"),
            ));
        }
    };
    // Verify that all data has been consumed and decoded.
    if rdr.position() < payload.len() as u64 {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "undecoded response data",
        ));
    }
    Ok(rsp)
}

/// Decodes an exception response PDU, i.e. a function code with the
/// high bit set followed by a single exception code.
pub fn decode_exception_pdu(function: u8, payload: &[u8]) -> io::Result<ExceptionResponse> {
    if function & EXCEPTION_BIT == 0 {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "Invalid exception function code",
        ));
    }
    let &[exception] = payload else {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("invalid exception payload length: {}", payload.len()),
        ));
    };
    Ok(ExceptionResponse {
        function: FunctionCode::new(function & !EXCEPTION_BIT),
        exception: ExceptionCode::new(exception),
    })
}

fn bool_to_coil(state: bool) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

fn coil_to_bool(coil: u16) -> io::Result<bool> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(Error::new(
            ErrorKind::InvalidData,
            format!("Invalid coil value: 0x{coil:04X}"),
        )),
    }
}

pub(crate) fn packed_coils_size(coils: &[Coil]) -> usize {
    (coils.len() + 7) / 8
}

fn encode_packed_coils(buf: &mut BytesMut, coils: &[Coil]) -> usize {
    let packed_coils_size = packed_coils_size(coils);
    let offset = buf.len();
    buf.resize(offset + packed_coils_size, 0);
    let buf = &mut buf[offset..];
    for (i, b) in coils.iter().enumerate() {
        let v = u8::from(*b); // 0 or 1
        buf[i / 8] |= v << (i % 8);
    }
    packed_coils_size
}

fn decode_packed_coils(bytes: &[u8], count: Quantity) -> Vec<Coil> {
    let mut res = Vec::with_capacity(count.into());
    for i in 0usize..count.into() {
        res.push((bytes[i / 8] >> (i % 8)) & 0b1 > 0);
    }
    res
}

/// Size of the encoded request PDU including the function code.
pub(crate) fn request_pdu_size(req: &Request<'_>) -> usize {
    use crate::frame::Request::*;
    match req {
        ReadCoils(_, _)
        | ReadDiscreteInputs(_, _)
        | ReadInputRegisters(_, _)
        | ReadHoldingRegisters(_, _)
        | WriteSingleRegister(_, _)
        | WriteSingleCoil(_, _) => 5,
        WriteMultipleCoils(_, coils) => 6 + packed_coils_size(coils),
        WriteMultipleRegisters(_, data) => 6 + data.len() * 2,
    }
}
