//! Streaming result writer (C6).
//!
//! The writer is agnostic to what carries its frames: a one-shot response
//! stream and a duplex socket both implement [`ReplyChannel`], the
//! capability design note 9 calls for — `write_line` plus a flag saying
//! whether out-of-band progress frames make sense on this channel at all.
use std::fmt::Write as _;

use crate::setops::OutofMarker;

/// Up to how many ids are joined into a single `RESULT` frame.
const BATCH_SIZE: usize = 50;

/// A destination for line-framed text, shared by the writer, the queue's
/// progress notifier, and intake's `QUEUED` acknowledgement.
///
/// Write failures (the client went away mid-stream) are the transport's
/// problem, not the engine's: callers are expected to swallow them, since a
/// dropped client does not stop the worker from finishing its job.
pub trait ReplyChannel: Send {
    fn write_line(&mut self, line: &str) -> std::io::Result<()>;

    /// Whether this channel flavor wants out-of-band progress frames
    /// (`WAITING`/`WORKING`) from the notifier. One-shot reply streams
    /// don't: there is nowhere to put a frame that isn't the final body.
    fn supports_progress(&self) -> bool;
}

/// Batches ids into `RESULT` frames and emits the trailing size marker.
pub struct ResultWriter<'a> {
    channel: &'a mut dyn ReplyChannel,
    batch: String,
    batch_len: usize,
}

impl<'a> ResultWriter<'a> {
    pub fn new(channel: &'a mut dyn ReplyChannel) -> ResultWriter<'a> {
        ResultWriter {
            channel,
            batch: String::new(),
            batch_len: 0,
        }
    }

    /// Appends one result id, flushing a full batch as a `RESULT` frame.
    pub fn emit(&mut self, id: i32) {
        if self.batch_len > 0 {
            self.batch.push('|');
        }
        let _ = write!(self.batch, "{}", id);
        self.batch_len += 1;
        if self.batch_len == BATCH_SIZE {
            self.flush_batch();
        }
    }

    fn flush_batch(&mut self) {
        if self.batch_len > 0 {
            let _ = self.channel.write_line(&format!("RESULT {}", self.batch));
            self.batch.clear();
            self.batch_len = 0;
        }
    }

    /// Flushes any residual batch and emits the trailing `OUTOF` marker, or
    /// nothing at all when the operator omits it (NOT's reference behavior).
    pub fn finish(mut self, outof: OutofMarker) {
        self.flush_batch();
        match outof {
            OutofMarker::Exact(n) | OutofMarker::Estimated(n) => {
                let _ = self.channel.write_line(&format!("OUTOF {}", n));
            }
            OutofMarker::Omitted => {}
        }
    }

    /// Reports PATH failure. Consumes the writer since nothing else follows.
    pub fn finish_nopath(self) {
        let _ = self.channel.write_line("NOPATH");
    }
}
