// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::Bytes;

use super::*;

use crate::Slave;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Header {
    pub(crate) slave: Slave,
}

#[derive(Debug, Clone)]
pub(crate) struct RequestAdu<'a> {
    pub(crate) hdr: Header,
    pub(crate) pdu: &'a Request<'a>,
}

/// A decoded RTU frame with a valid CRC.
///
/// The payload is not interpreted, i.e. it contains everything between
/// the function code and the CRC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub slave: Slave,
    pub function: u8,
    pub payload: Bytes,
}

impl Frame {
    pub(crate) fn header(&self) -> Header {
        Header { slave: self.slave }
    }

    /// Whether the slave answered with an exception response.
    #[must_use]
    pub fn is_exception(&self) -> bool {
        self.function & EXCEPTION_BIT != 0
    }
}

pub(crate) fn verify_response_header(req_hdr: &Header, rsp_hdr: &Header) -> Result<(), String> {
    if req_hdr != rsp_hdr {
        return Err(format!(
            "expected/request = {req_hdr:?}, actual/response = {rsp_hdr:?}"
        ));
    }
    Ok(())
}
