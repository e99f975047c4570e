//! Decoder that stalls until released
//!
//! While the gate is closed every read fails (after a short sleep), which
//! the decode thread treats as an undecodable unit and retries. Tests use
//! it to fill sink queues, close the gate, and then observe that nothing
//! refills them.

use kinema_player::media::{
    DecodedUnit, MediaDecoder, MediaOpener, StreamInfo, StreamKind, StreamSelection, SyntheticMedia,
    SyntheticOpener,
};
use kinema_player::{Error, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Clone)]
pub struct GatedOpener {
    inner: SyntheticOpener,
    open: Arc<AtomicBool>,
}

impl GatedOpener {
    /// Wrap `media` with the gate initially open
    pub fn new(media: SyntheticMedia) -> Self {
        Self {
            inner: SyntheticOpener::new(media),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn close_gate(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn open_gate(&self) {
        self.open.store(true, Ordering::SeqCst);
    }
}

impl MediaOpener for GatedOpener {
    fn open(&self, resource: &Path, selection: StreamSelection) -> Result<Box<dyn MediaDecoder>> {
        Ok(Box::new(GatedDecoder {
            inner: self.inner.open(resource, selection)?,
            open: Arc::clone(&self.open),
        }))
    }
}

struct GatedDecoder {
    inner: Box<dyn MediaDecoder>,
    open: Arc<AtomicBool>,
}

impl MediaDecoder for GatedDecoder {
    fn info(&self) -> &StreamInfo {
        self.inner.info()
    }

    fn read_next_unit(&mut self) -> Result<DecodedUnit> {
        if !self.open.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
            return Err(Error::Decode("gate closed".to_string()));
        }
        self.inner.read_next_unit()
    }

    fn seek(&mut self, stream: StreamKind, position: Duration) -> Result<()> {
        self.inner.seek(stream, position)
    }

    fn flush_buffers(&mut self, stream: StreamKind) {
        self.inner.flush_buffers(stream)
    }
}
