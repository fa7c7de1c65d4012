// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Half-duplex byte transport with RTU frame timing.
//!
//! RTU frames are delimited by silence on the line. The channel keeps
//! track of the last activity so that a new frame is never started
//! before the inter-frame gap has elapsed, and it assembles received
//! bytes into frames by waiting for the gap to occur.

use std::{io, time::Duration};

use bytes::BytesMut;
use tokio::{
    io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _},
    time::{sleep_until, timeout, Instant},
};

use crate::codec::rtu::MAX_ADU_LEN;

#[cfg(feature = "serial")]
use crate::config::SerialConfig;

/// Inter-frame gap used until configured otherwise.
const DEFAULT_INTER_FRAME_GAP: Duration = Duration::from_micros(1_750);

/// A serial line or any other byte stream that carries RTU frames.
#[derive(Debug)]
pub struct Channel<T> {
    transport: T,
    inter_frame_gap: Duration,
    last_activity: Option<Instant>,
}

#[cfg(feature = "serial")]
impl Channel<tokio_serial::SerialStream> {
    /// Opens the serial port described by `config`.
    pub fn open(config: &SerialConfig) -> io::Result<Self> {
        let port = tokio_serial::SerialStream::open(&config.builder())?;
        log::debug!(
            "Opened {} at {} baud, inter-frame gap {:?}",
            config.path,
            config.baud_rate,
            config.inter_frame_gap()
        );
        Ok(Self::new(port).with_inter_frame_gap(config.inter_frame_gap()))
    }
}

impl<T> Channel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Attaches an already opened transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            inter_frame_gap: DEFAULT_INTER_FRAME_GAP,
            last_activity: None,
        }
    }

    #[must_use]
    pub fn with_inter_frame_gap(mut self, inter_frame_gap: Duration) -> Self {
        self.inter_frame_gap = inter_frame_gap;
        self
    }

    pub fn set_inter_frame_gap(&mut self, inter_frame_gap: Duration) {
        self.inter_frame_gap = inter_frame_gap;
    }

    #[must_use]
    pub fn inter_frame_gap(&self) -> Duration {
        self.inter_frame_gap
    }

    fn touch(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    /// Sends a complete frame.
    ///
    /// Waits until the line has been silent for the inter-frame gap
    /// before the first byte is written. Fails unless all bytes could
    /// be written and flushed.
    pub async fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        if let Some(last_activity) = self.last_activity {
            sleep_until(last_activity + self.inter_frame_gap).await;
        }
        log::trace!("Sending {} byte(s): {:02X?}", frame.len(), frame);
        let res = async {
            self.transport.write_all(frame).await?;
            self.transport.flush().await
        }
        .await;
        self.touch();
        res
    }

    /// Receives a single frame.
    ///
    /// Waits up to `response_timeout` for the first byte, then collects
    /// bytes until the line has been silent for `inter_frame_timeout`
    /// or the maximum ADU size has been reached. Returns an empty buffer
    /// if nothing has been received in time.
    pub async fn read_frame(
        &mut self,
        response_timeout: Duration,
        inter_frame_timeout: Duration,
    ) -> io::Result<BytesMut> {
        let mut frame = BytesMut::with_capacity(MAX_ADU_LEN);
        let mut chunk = [0; MAX_ADU_LEN];

        let Ok(res) = timeout(response_timeout, self.transport.read(&mut chunk)).await else {
            log::trace!("No response within {response_timeout:?}");
            return Ok(frame);
        };
        let len = res?;
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "transport closed",
            ));
        }
        frame.extend_from_slice(&chunk[..len]);
        self.touch();

        while frame.len() < MAX_ADU_LEN {
            let remaining = MAX_ADU_LEN - frame.len();
            let Ok(res) = timeout(
                inter_frame_timeout,
                self.transport.read(&mut chunk[..remaining]),
            )
            .await
            else {
                break;
            };
            let len = res?;
            if len == 0 {
                // Closed while receiving. The next read reports it.
                break;
            }
            frame.extend_from_slice(&chunk[..len]);
            self.touch();
        }
        log::trace!("Received {} byte(s): {:02X?}", frame.len(), &frame[..]);
        Ok(frame)
    }

    /// Drops all pending input until the line has been silent for
    /// `inter_frame_timeout`.
    ///
    /// Gives up after `max_duration` if the line never falls silent.
    /// Returns the number of discarded bytes.
    pub async fn discard_input(
        &mut self,
        inter_frame_timeout: Duration,
        max_duration: Duration,
    ) -> io::Result<usize> {
        let deadline = Instant::now() + max_duration;
        let mut chunk = [0; MAX_ADU_LEN];
        let mut discarded = 0;
        loop {
            let now = Instant::now();
            if now >= deadline {
                log::warn!("Line still busy after {max_duration:?}");
                break;
            }
            let wait = inter_frame_timeout.min(deadline - now);
            let Ok(res) = timeout(wait, self.transport.read(&mut chunk)).await else {
                break;
            };
            match res? {
                0 => break,
                len => {
                    discarded += len;
                    self.touch();
                }
            }
        }
        if discarded > 0 {
            log::debug!("Discarded {discarded} byte(s) of pending input");
        }
        Ok(discarded)
    }

    /// Shuts the transport down.
    pub async fn close(mut self) -> io::Result<()> {
        self.transport.shutdown().await
    }
}
