// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request/response transactions with retries.
//!
//! A transaction sends a request frame and waits for the matching
//! response. Timeouts, corrupted frames and responses that do not fit
//! the request are retried. Exception responses are final.

use std::{fmt, io};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Encoder as _;

use crate::{
    channel::Channel,
    codec::{self, rtu::ClientCodec},
    config::TransactionConfig,
    frame::rtu::{verify_response_header, Header, RequestAdu},
    DecodeError, Error, ExceptionCode, Request, Response, Result, Slave, TransactionContext,
};

/// The phase a transaction is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction in flight.
    Idle,
    /// The request frame is being written.
    Sending,
    /// The request has been sent and the response is awaited.
    WaitingResponse,
    /// The transaction completed with a valid response.
    Success,
    /// The last attempt failed and the request is going to be repeated.
    Retrying,
    /// The transaction failed.
    Failed,
}

/// Why a single attempt failed.
#[derive(Debug)]
enum Failure {
    Write(io::Error),
    Read(io::Error),
    Timeout,
    Corrupted(DecodeError),
    Malformed(String),
    Exception(ExceptionCode),
}

impl Failure {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Write(_) | Self::Timeout | Self::Corrupted(_) | Self::Malformed(_) => true,
            Self::Read(_) | Self::Exception(_) => false,
        }
    }

    fn into_error(self, context: TransactionContext) -> Error {
        match self {
            Self::Write(source) | Self::Read(source) => Error::Channel {
                context: Some(context),
                source,
            },
            Self::Timeout => Error::Timeout { context },
            Self::Corrupted(source) => Error::CrcMismatch { context, source },
            Self::Malformed(message) => Error::MalformedResponse { context, message },
            Self::Exception(exception) => Error::Exception { context, exception },
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write(err) => write!(f, "write failed: {err}"),
            Self::Read(err) => write!(f, "read failed: {err}"),
            Self::Timeout => f.write_str("no response"),
            Self::Corrupted(err) => write!(f, "{err}"),
            Self::Malformed(message) => write!(f, "malformed response: {message}"),
            Self::Exception(exception) => write!(f, "exception: {exception}"),
        }
    }
}

/// Executes transactions over a [`Channel`], one at a time.
#[derive(Debug)]
pub struct Engine<T> {
    channel: Channel<T>,
    codec: ClientCodec,
    config: TransactionConfig,
    state: TransactionState,
}

impl<T> Engine<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(mut channel: Channel<T>, config: TransactionConfig) -> Self {
        channel.set_inter_frame_gap(config.inter_frame_timeout());
        Self {
            channel,
            codec: ClientCodec,
            config,
            state: TransactionState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Sends `request` to `slave` and returns the validated response.
    ///
    /// Broadcast requests are answered with the echo a slave would have
    /// replied with. The engine is back in [`TransactionState::Idle`]
    /// when this returns.
    pub async fn execute(&mut self, slave: Slave, request: &Request<'_>) -> Result<Response> {
        log::debug!("Call {request:?} on slave {slave}");
        let broadcast_echo = if slave.is_broadcast() {
            let echo = Response::echo_of(request)
                .filter(|_| request.is_write())
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "{} cannot be broadcast",
                        request.function_code()
                    ))
                })?;
            Some(echo)
        } else {
            None
        };
        let mut adu = BytesMut::new();
        self.codec
            .encode(
                RequestAdu {
                    hdr: Header { slave },
                    pdu: request,
                },
                &mut adu,
            )
            .map_err(|err| Error::InvalidArgument(err.to_string()))?;

        let res = self.transact(&adu, slave, request, broadcast_echo).await;
        log::trace!("Transaction finished in state {:?}", self.state);
        self.state = TransactionState::Idle;
        res
    }

    async fn transact(
        &mut self,
        adu: &[u8],
        slave: Slave,
        request: &Request<'_>,
        broadcast_echo: Option<Response>,
    ) -> Result<Response> {
        let max_attempts = u16::from(self.config.max_retries) + 1;
        let mut context = TransactionContext {
            slave,
            function: request.function_code(),
            address: request.address(),
            attempts: 0,
        };
        loop {
            context.attempts += 1;
            let res = match &broadcast_echo {
                Some(echo) => self.send_broadcast(adu).await.map(|()| echo.clone()),
                None => self.attempt(adu, slave, request).await,
            };
            let failure = match res {
                Ok(response) => {
                    self.state = TransactionState::Success;
                    return Ok(response);
                }
                Err(failure) => failure,
            };
            if !failure.is_retryable() || context.attempts >= max_attempts {
                log::debug!("Transaction failed: {failure} ({context})");
                self.state = TransactionState::Failed;
                return Err(failure.into_error(context));
            }
            log::warn!("Retrying after {failure} ({context})");
            self.state = TransactionState::Retrying;
            tokio::time::sleep(self.config.retry_backoff).await;
            if let Err(source) = self
                .channel
                .discard_input(
                    self.config.inter_frame_timeout(),
                    self.config.response_timeout,
                )
                .await
            {
                self.state = TransactionState::Failed;
                return Err(Error::Channel {
                    context: Some(context),
                    source,
                });
            }
        }
    }

    /// Broadcasts are never answered. Slaves need the turnaround delay
    /// to process the request before the line may be used again.
    async fn send_broadcast(&mut self, adu: &[u8]) -> std::result::Result<(), Failure> {
        self.state = TransactionState::Sending;
        self.channel.write(adu).await.map_err(Failure::Write)?;
        tokio::time::sleep(self.config.broadcast_delay).await;
        Ok(())
    }

    async fn attempt(
        &mut self,
        adu: &[u8],
        slave: Slave,
        request: &Request<'_>,
    ) -> std::result::Result<Response, Failure> {
        self.state = TransactionState::Sending;
        self.channel.write(adu).await.map_err(Failure::Write)?;

        self.state = TransactionState::WaitingResponse;
        let buf = self
            .channel
            .read_frame(
                self.config.response_timeout,
                self.config.inter_frame_timeout(),
            )
            .await
            .map_err(Failure::Read)?;
        if buf.is_empty() {
            return Err(Failure::Timeout);
        }
        let frame = codec::rtu::decode(&buf).map_err(Failure::Corrupted)?;
        verify_response_header(&Header { slave }, &frame.header()).map_err(Failure::Malformed)?;

        let function = request.function_code();
        if frame.is_exception() {
            if frame.function != function.exception_value() {
                return Err(Failure::Malformed(format!(
                    "unexpected exception function code 0x{:0>2X}",
                    frame.function
                )));
            }
            let rsp = codec::decode_exception_pdu(frame.function, &frame.payload)
                .map_err(|err| Failure::Malformed(err.to_string()))?;
            log::debug!("{rsp}");
            return Err(Failure::Exception(rsp.exception));
        }
        if frame.function != function.value() {
            return Err(Failure::Malformed(format!(
                "function code mismatch: expected {function}, actual 0x{:0>2X}",
                frame.function
            )));
        }
        let rsp = codec::decode_response_pdu(frame.function, &frame.payload)
            .map_err(|err| Failure::Malformed(err.to_string()))?;
        verify_response(request, &rsp).map_err(Failure::Malformed)?;
        Ok(rsp)
    }

    /// Discards all pending input.
    ///
    /// Returns the number of dropped bytes.
    pub async fn flush(&mut self) -> Result<usize> {
        let discarded = self
            .channel
            .discard_input(
                self.config.inter_frame_timeout(),
                self.config.response_timeout,
            )
            .await?;
        Ok(discarded)
    }

    /// Closes the underlying channel.
    pub async fn close(self) -> Result<()> {
        self.channel.close().await?;
        Ok(())
    }
}

/// Checks that the response carries what has been requested.
fn verify_response(request: &Request<'_>, response: &Response) -> std::result::Result<(), String> {
    use crate::frame::Request::*;

    let expected_len = match request {
        // Coils are unpacked byte-wise
        ReadCoils(_, qty) | ReadDiscreteInputs(_, qty) => usize::from(*qty).div_ceil(8) * 8,
        ReadInputRegisters(_, qty) | ReadHoldingRegisters(_, qty) => usize::from(*qty),
        WriteSingleCoil(_, _)
        | WriteMultipleCoils(_, _)
        | WriteSingleRegister(_, _)
        | WriteMultipleRegisters(_, _) => {
            if Response::echo_of(request).as_ref() != Some(response) {
                return Err(format!("unexpected echo {response:?}"));
            }
            return Ok(());
        }
    };
    let actual_len = match response {
        Response::ReadCoils(coils) | Response::ReadDiscreteInputs(coils) => coils.len(),
        Response::ReadInputRegisters(words) | Response::ReadHoldingRegisters(words) => words.len(),
        _ => return Err(format!("unexpected response {response:?}")),
    };
    if actual_len != expected_len {
        return Err(format!(
            "invalid data length: expected {expected_len}, actual {actual_len}"
        ));
    }
    Ok(())
}
