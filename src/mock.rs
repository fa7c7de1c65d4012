// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted in-memory transport for unit tests.

use std::{
    collections::VecDeque,
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll, Waker},
};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// How the simulated slave reacts to the next written frame.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// Answer with these bytes.
    Bytes(Vec<u8>),
    /// Stay silent.
    Silence,
    /// Fail the write.
    WriteError(io::ErrorKind),
    /// Fail the next read.
    ReadError(io::ErrorKind),
}

#[derive(Debug, Default)]
struct State {
    script: VecDeque<Reply>,
    written: Vec<Vec<u8>>,
    pending: VecDeque<u8>,
    read_error: Option<io::ErrorKind>,
    reader: Option<Waker>,
}

/// Inspects what has been sent through a [`MockTransport`].
#[derive(Debug, Clone)]
pub(crate) struct MockHandle(Arc<Mutex<State>>);

impl MockHandle {
    /// All successfully written frames in order.
    pub(crate) fn written(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().written.clone()
    }

    pub(crate) fn write_count(&self) -> usize {
        self.0.lock().unwrap().written.len()
    }

    /// Injects bytes that have not been requested.
    pub(crate) fn push_input(&self, bytes: &[u8]) {
        let mut state = self.0.lock().unwrap();
        state.pending.extend(bytes);
        if let Some(waker) = state.reader.take() {
            waker.wake();
        }
    }
}

#[derive(Debug)]
pub(crate) struct MockTransport(Arc<Mutex<State>>);

impl MockTransport {
    pub(crate) fn new(script: impl IntoIterator<Item = Reply>) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(State {
            script: script.into_iter().collect(),
            ..Default::default()
        }));
        (Self(Arc::clone(&state)), MockHandle(state))
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.0.lock().unwrap();
        if let Some(kind) = state.read_error.take() {
            return Poll::Ready(Err(kind.into()));
        }
        if state.pending.is_empty() {
            state.reader = Some(cx.waker().clone());
            return Poll::Pending;
        }
        let len = buf.remaining().min(state.pending.len());
        let bytes: Vec<u8> = state.pending.drain(..len).collect();
        buf.put_slice(&bytes);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.0.lock().unwrap();
        match state.script.pop_front().unwrap_or(Reply::Silence) {
            Reply::WriteError(kind) => return Poll::Ready(Err(kind.into())),
            Reply::Bytes(bytes) => state.pending.extend(bytes),
            Reply::ReadError(kind) => state.read_error = Some(kind),
            Reply::Silence => {}
        }
        state.written.push(buf.to_vec());
        if let Some(waker) = state.reader.take() {
            waker.wake();
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
