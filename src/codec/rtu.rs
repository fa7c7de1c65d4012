// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTU framing: slave address, PDU and CRC16.
//!
//! RTU frames carry no length prefix. Frame boundaries on the line are
//! given by inter-frame silence, see [`crate::channel`].

use std::io;

use bytes::{BufMut as _, Bytes, BytesMut};
use tokio_util::codec::Encoder;

use super::{crc, encode_request_pdu, request_pdu_size};

use crate::{
    frame::rtu::{Frame, RequestAdu},
    DecodeError, Slave,
};

/// Address + function code + CRC.
pub const MIN_ADU_LEN: usize = 1 + 1 + 2;

/// Address + maximum PDU + CRC.
pub const MAX_ADU_LEN: usize = 1 + super::MAX_PDU_SIZE + 2;

/// Serializes a frame, appending the CRC16 low byte first.
#[must_use]
pub fn encode(slave: Slave, function: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + MIN_ADU_LEN);
    buf.put_u8(slave.into());
    buf.put_u8(function);
    buf.put_slice(payload);
    put_crc(&mut buf);
    buf.freeze()
}

fn put_crc(buf: &mut BytesMut) {
    let crc = crc::compute(buf);
    buf.put_u16_le(crc);
}

/// Parses a received frame and validates its CRC.
///
/// The payload is not interpreted.
pub fn decode(adu: &[u8]) -> Result<Frame, DecodeError> {
    if adu.len() < MIN_ADU_LEN {
        return Err(DecodeError::TooShort(adu.len()));
    }
    let (data, _) = adu.split_at(adu.len() - 2);
    let expected = crc::compute(data);
    let actual = crc::trailing(adu).unwrap_or_default();
    if expected != actual {
        return Err(DecodeError::CrcMismatch { expected, actual });
    }
    Ok(Frame {
        slave: Slave(data[0]),
        function: data[1],
        payload: Bytes::copy_from_slice(&data[2..]),
    })
}

/// Encoder for request ADUs sent by a client.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ClientCodec;

impl<'a> Encoder<RequestAdu<'a>> for ClientCodec {
    type Error = io::Error;

    fn encode(&mut self, adu: RequestAdu<'a>, buf: &mut BytesMut) -> io::Result<()> {
        let RequestAdu { hdr, pdu } = adu;
        let pdu_len = request_pdu_size(pdu);
        if pdu_len > super::MAX_PDU_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "request PDU size exceeded",
            ));
        }
        let offset = buf.len();
        buf.reserve(pdu_len + 3);
        buf.put_u8(hdr.slave.into());
        encode_request_pdu(buf, pdu);
        let crc = crc::compute(&buf[offset..]);
        buf.put_u16_le(crc);
        Ok(())
    }
}
