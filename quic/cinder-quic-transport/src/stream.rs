// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Application streams and their user-facing handles.
//!
//! Stream records live in an arena owned by the connection, keyed by
//! stream id; [`StreamReader`] and [`StreamWriter`] reference the
//! connection through a shared handle rather than a back-pointer, so
//! the record and its handles never form a reference cycle.

use crate::{buffer::Reassembler, connection::Handle};
use cinder_quic_core::stream::StreamId;
use core::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
};

/// Writers suspend in [`StreamWriter::drain`] while more than this many
/// bytes sit in the send buffer
pub const HIGH_WATER: usize = 65_536;

pub(crate) struct StreamState {
    pub id: StreamId,

    /// Reassembly of received STREAM frames
    pub recv: Reassembler,
    pub recv_waker: Option<Waker>,

    /// Bytes accepted from the writer but not yet framed
    pub send_buffer: Vec<u8>,
    pub send_waker: Option<Waker>,

    /// Next stream offset to transmit
    pub send_offset: u64,

    /// Receive credit granted to the peer
    pub max_data_local: u64,

    /// Send credit granted by the peer
    pub max_data_remote: u64,

    pub fin_pending: bool,
    pub fin_sent: bool,

    pub reset_sent: Option<u16>,
    pub reset_received: Option<u16>,
    pub stop_sending_received: Option<u16>,
}

impl StreamState {
    pub fn new(id: StreamId, max_data_local: u64, max_data_remote: u64) -> Self {
        Self {
            id,
            recv: Reassembler::new(),
            recv_waker: None,
            send_buffer: Vec::new(),
            send_waker: None,
            send_offset: 0,
            max_data_local,
            max_data_remote,
            fin_pending: false,
            fin_sent: false,
            reset_sent: None,
            reset_received: None,
            stop_sending_received: None,
        }
    }

    pub fn fin_received(&self) -> bool {
        self.recv.final_size().is_some()
    }

    /// Both directions have finished; the record can be dropped
    pub fn is_closed(&self) -> bool {
        let send_done = self.fin_sent || self.reset_sent.is_some();
        let recv_done = (self.fin_received() && self.recv.is_complete())
            || self.reset_received.is_some();
        send_done && recv_done
    }

    /// Send credit remaining under the stream-level limit
    pub fn send_allowance(&self) -> u64 {
        self.max_data_remote.saturating_sub(self.send_offset)
    }

    pub fn wake_reader(&mut self) {
        if let Some(waker) = self.recv_waker.take() {
            waker.wake();
        }
    }

    pub fn wake_writer(&mut self) {
        if let Some(waker) = self.send_waker.take() {
            waker.wake();
        }
    }
}

/// The read half of a stream
pub struct StreamReader {
    pub(crate) conn: Handle,
    pub(crate) id: u64,
}

impl StreamReader {
    pub fn stream_id(&self) -> u64 {
        self.id
    }

    /// Reads up to `max_bytes`, waiting until data or the end of the
    /// stream arrives; the empty vec signals end of stream
    pub fn read(&self, max_bytes: usize) -> Read<'_> {
        Read {
            reader: self,
            max_bytes: Some(max_bytes),
        }
    }

    /// Reads everything through the end of the stream
    pub fn read_to_end(&self) -> Read<'_> {
        Read {
            reader: self,
            max_bytes: None,
        }
    }
}

pub struct Read<'a> {
    reader: &'a StreamReader,
    max_bytes: Option<usize>,
}

impl Future for Read<'_> {
    type Output = Vec<u8>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.reader.conn.borrow_mut();
        inner.poll_read_stream(self.reader.id, self.max_bytes, cx)
    }
}

impl fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StreamReader")
            .field("stream_id", &self.id)
            .finish()
    }
}

/// The write half of a stream
pub struct StreamWriter {
    pub(crate) conn: Handle,
    pub(crate) id: u64,
}

impl StreamWriter {
    pub fn stream_id(&self) -> u64 {
        self.id
    }

    /// Buffers `data` and schedules a build pass; bytes leave as send
    /// credit allows
    pub fn write(&self, data: &[u8]) {
        let mut inner = self.conn.borrow_mut();
        inner.stream_write(self.id, data);
    }

    /// Schedules a STREAM frame with FIN and no further bytes
    pub fn write_eof(&self) {
        let mut inner = self.conn.borrow_mut();
        inner.stream_write_eof(self.id);
    }

    /// Waits until the send buffer falls below the high-water mark
    pub fn drain(&self) -> Drain<'_> {
        Drain { writer: self }
    }
}

impl fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StreamWriter")
            .field("stream_id", &self.id)
            .finish()
    }
}

pub struct Drain<'a> {
    writer: &'a StreamWriter,
}

impl Future for Drain<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.writer.conn.borrow_mut();
        inner.poll_drain_stream(self.writer.id, cx)
    }
}
