// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::{fmt, io};

use thiserror::Error;

use crate::{Address, ExceptionCode, FunctionCode, Slave};

/// Failure to decode a received RTU frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Less than the 4 bytes of address, function code and CRC.
    #[error("frame too short: {0} byte(s)")]
    TooShort(usize),

    /// The trailing CRC does not match the contents of the frame.
    #[error("CRC mismatch: expected 0x{expected:0>4X}, actual 0x{actual:0>4X}")]
    CrcMismatch { expected: u16, actual: u16 },
}

/// Identifies the transaction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionContext {
    pub slave: Slave,
    pub function: FunctionCode,
    pub address: Address,
    /// Number of times the request has been sent, including the first one.
    pub attempts: u16,
}

impl TransactionContext {
    /// Number of retries that preceded the failure.
    #[must_use]
    pub fn retries(&self) -> u16 {
        self.attempts.saturating_sub(1)
    }
}

impl fmt::Display for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slave {}, function {}, address 0x{:0>4X}, {} attempt(s)",
            self.slave, self.function, self.address, self.attempts
        )
    }
}

/// Errors of Modbus RTU client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller violated a protocol limit. No I/O has been attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The serial port could not be opened, written, read or closed.
    ///
    /// The context is present if the failure occurred during a transaction.
    /// The channel should be considered unusable until it is reopened.
    #[error("channel error: {source}{}", display_context(.context))]
    Channel {
        context: Option<TransactionContext>,
        source: io::Error,
    },

    /// No response within the response timeout, on every attempt.
    #[error("no response ({context})")]
    Timeout { context: TransactionContext },

    /// The last response was corrupted on the line.
    #[error("{source} ({context})")]
    CrcMismatch {
        context: TransactionContext,
        source: DecodeError,
    },

    /// The slave rejected the request. Never retried.
    #[error("exception: {exception} ({context})")]
    Exception {
        context: TransactionContext,
        exception: ExceptionCode,
    },

    /// The last response did not fit the request.
    #[error("malformed response: {message} ({context})")]
    MalformedResponse {
        context: TransactionContext,
        message: String,
    },
}

fn display_context(context: &Option<TransactionContext>) -> String {
    context
        .as_ref()
        .map(|context| format!(" ({context})"))
        .unwrap_or_default()
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Self::Channel {
            context: None,
            source,
        }
    }
}

impl Error {
    /// The context of the failed transaction, if any I/O has been attempted.
    #[must_use]
    pub fn context(&self) -> Option<&TransactionContext> {
        match self {
            Self::InvalidArgument(_) => None,
            Self::Channel { context, .. } => context.as_ref(),
            Self::Timeout { context }
            | Self::CrcMismatch { context, .. }
            | Self::Exception { context, .. }
            | Self::MalformedResponse { context, .. } => Some(context),
        }
    }

    /// The exception code of a rejected request.
    #[must_use]
    pub fn exception(&self) -> Option<ExceptionCode> {
        match self {
            Self::Exception { exception, .. } => Some(*exception),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TransactionContext {
        TransactionContext {
            slave: Slave(0x11),
            function: FunctionCode::ReadHoldingRegisters,
            address: 0x006B,
            attempts: 4,
        }
    }

    #[test]
    fn display_with_context() {
        let err = Error::Timeout { context: context() };
        assert_eq!(
            err.to_string(),
            "no response (slave 0x11, function 0x03, address 0x006B, 4 attempt(s))"
        );

        let err = Error::CrcMismatch {
            context: context(),
            source: DecodeError::CrcMismatch {
                expected: 0x0BC4,
                actual: 0x0BC5,
            },
        };
        assert!(err.to_string().starts_with("CRC mismatch: expected 0x0BC4"));
    }

    #[test]
    fn channel_error_with_and_without_context() {
        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "no such port"));
        assert_eq!(err.to_string(), "channel error: no such port");
        assert!(err.context().is_none());

        let err = Error::Channel {
            context: Some(context()),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"),
        };
        assert_eq!(
            err.to_string(),
            "channel error: broken pipe (slave 0x11, function 0x03, address 0x006B, 4 attempt(s))"
        );
        assert_eq!(err.context().map(TransactionContext::retries), Some(3));
    }

    #[test]
    fn retries_exclude_first_attempt() {
        assert_eq!(context().retries(), 3);
    }

    #[test]
    fn exception_accessor() {
        let err = Error::Exception {
            context: context(),
            exception: ExceptionCode::IllegalDataAddress,
        };
        assert_eq!(err.exception(), Some(ExceptionCode::IllegalDataAddress));
        assert_eq!(err.context().map(|ctx| ctx.attempts), Some(4));

        let err = Error::InvalidArgument("quantity".to_owned());
        assert!(err.exception().is_none());
        assert!(err.context().is_none());
    }
}
