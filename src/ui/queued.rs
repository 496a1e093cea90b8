//! Queued backend: terminal writes on a dedicated thread
//!
//! Every call is recorded as an [`Op`] and pushed onto a bounded channel.
//! One writer thread owns the real backend and replays the ops in order.
//! `flush()` waits until the writer has drained everything queued before it
//! and flushed the inner backend, so a frame is on the terminal when it
//! returns.

use std::io;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::backend::{Attribute, Backend, Capabilities};
use super::memory::Op;

/// Ops buffered before the producer blocks
const QUEUE_DEPTH: usize = 1024;

enum Request {
    Op(Op),
    Flush(SyncSender<io::Result<()>>),
    Size(SyncSender<io::Result<(u16, u16)>>),
}

fn replay<B: Backend>(backend: &mut B, op: Op) -> io::Result<()> {
    match op {
        Op::MoveTo(row, col) => backend.move_to(row, col),
        Op::ClearEol => backend.clear_to_eol(),
        Op::ClearScreen => backend.clear_screen(),
        Op::Scroll { top, bottom, count } => backend.scroll_region(top, bottom, count),
        Op::InsertLines(n) => backend.insert_lines(n),
        Op::DeleteLines(n) => backend.delete_lines(n),
        Op::Attribute(attr, on) => backend.set_attribute(attr, on),
        Op::Color(fg, bg) => backend.set_color(fg, bg),
        Op::Text(text) => backend.write_text(&text),
        Op::Bell => backend.bell(),
        Op::Flush => backend.flush(),
    }
}

fn writer_loop<B: Backend>(mut backend: B, rx: Receiver<Request>) -> B {
    // First failure since the last flush; reported by the next flush
    let mut pending: Option<io::Error> = None;
    for request in rx {
        match request {
            Request::Op(op) => {
                if pending.is_none() {
                    if let Err(e) = replay(&mut backend, op) {
                        warn!("queued write failed: {}", e);
                        pending = Some(e);
                    }
                }
            }
            Request::Flush(ack) => {
                let result = match pending.take() {
                    Some(e) => Err(e),
                    None => backend.flush(),
                };
                let _ = ack.send(result);
            }
            Request::Size(reply) => {
                let _ = reply.send(backend.size());
            }
        }
    }
    debug!("writer thread drained");
    backend
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "backend writer thread has stopped")
}

pub struct QueuedBackend<B: Backend + Send + 'static> {
    tx: Option<SyncSender<Request>>,
    writer: Option<JoinHandle<B>>,
    caps: Capabilities,
}

impl<B: Backend + Send + 'static> QueuedBackend<B> {
    pub fn new(inner: B) -> Self {
        let caps = inner.capabilities();
        let (tx, rx) = mpsc::sync_channel::<Request>(QUEUE_DEPTH);
        let writer = thread::spawn(move || writer_loop(inner, rx));
        Self {
            tx: Some(tx),
            writer: Some(writer),
            caps,
        }
    }

    fn send(&self, request: Request) -> io::Result<()> {
        match &self.tx {
            Some(tx) => tx.send(request).map_err(|_| closed()),
            None => Err(closed()),
        }
    }

    fn op(&mut self, op: Op) -> io::Result<()> {
        self.send(Request::Op(op))
    }

    /// Drain the queue, stop the writer and hand back the inner backend
    pub fn into_inner(mut self) -> io::Result<B> {
        self.shutdown().ok_or_else(closed)
    }

    fn shutdown(&mut self) -> Option<B> {
        drop(self.tx.take());
        self.writer.take().and_then(|handle| handle.join().ok())
    }
}

impl<B: Backend + Send + 'static> Backend for QueuedBackend<B> {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        let (reply, answer) = mpsc::sync_channel(1);
        self.send(Request::Size(reply))?;
        answer.recv().map_err(|_| closed())?
    }

    fn move_to(&mut self, row: u16, col: u16) -> io::Result<()> {
        self.op(Op::MoveTo(row, col))
    }

    fn clear_to_eol(&mut self) -> io::Result<()> {
        self.op(Op::ClearEol)
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        self.op(Op::ClearScreen)
    }

    fn scroll_region(&mut self, top: u16, bottom: u16, count: i16) -> io::Result<()> {
        self.op(Op::Scroll { top, bottom, count })
    }

    fn insert_lines(&mut self, count: u16) -> io::Result<()> {
        self.op(Op::InsertLines(count))
    }

    fn delete_lines(&mut self, count: u16) -> io::Result<()> {
        self.op(Op::DeleteLines(count))
    }

    fn set_attribute(&mut self, attr: Attribute, on: bool) -> io::Result<()> {
        self.op(Op::Attribute(attr, on))
    }

    fn set_color(&mut self, fg: Option<u8>, bg: Option<u8>) -> io::Result<()> {
        self.op(Op::Color(fg, bg))
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.op(Op::Text(text.to_string()))
    }

    fn bell(&mut self) -> io::Result<()> {
        self.op(Op::Bell)
    }

    /// Wait until everything queued so far is written and flushed
    fn flush(&mut self) -> io::Result<()> {
        let (ack, done) = mpsc::sync_channel(1);
        self.send(Request::Flush(ack))?;
        done.recv().map_err(|_| closed())?
    }
}

impl<B: Backend + Send + 'static> Drop for QueuedBackend<B> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::memory::MemoryBackend;

    #[test]
    fn test_ops_arrive_in_order() {
        let mut q = QueuedBackend::new(MemoryBackend::new(10, 2));
        q.move_to(0, 0).unwrap();
        q.write_text("one").unwrap();
        q.move_to(1, 0).unwrap();
        q.write_text("two").unwrap();
        q.flush().unwrap();

        let inner = q.into_inner().unwrap();
        assert_eq!(inner.lines(), vec!["one", "two"]);
        assert_eq!(
            inner.ops(),
            &[
                Op::MoveTo(0, 0),
                Op::Text("one".to_string()),
                Op::MoveTo(1, 0),
                Op::Text("two".to_string()),
                Op::Flush,
            ]
        );
    }

    #[test]
    fn test_size_and_capabilities_pass_through() {
        let q = QueuedBackend::new(MemoryBackend::with_capabilities(7, 3, Capabilities::CLEAR_EOL));
        assert_eq!(q.size().unwrap(), (7, 3));
        assert_eq!(q.capabilities(), Capabilities::CLEAR_EOL);
    }

    #[test]
    fn test_drop_drains_queue() {
        let mut q = QueuedBackend::new(MemoryBackend::new(4, 1));
        for _ in 0..100 {
            q.write_text("x").unwrap();
        }
        drop(q);
    }
}
