//! Host collaborators
//!
//! The runtime talks to its host through two narrow interfaces: [`HostHooks`]
//! for output and session state, and [`StreamLayer`] for raw file access.

use crate::value::RuntimeError;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Output and session hooks provided by the host
pub trait HostHooks: Send + Sync {
    /// Close the hosted session without persisting it.
    ///
    /// Returns whether a session was active.
    fn close_session_if_active(&self) -> Result<bool, RuntimeError>;

    /// Flush buffered output to the client
    fn flush_output(&self) -> Result<(), RuntimeError>;

    /// Append to the output buffer
    fn write_output(&self, data: &[u8]) -> Result<(), RuntimeError>;
}

/// Raw file access, used for the missing-script fallback and temp files
pub trait StreamLayer: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Local filesystem stream layer
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStreamLayer;

impl StreamLayer for FsStreamLayer {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

#[derive(Debug, Default)]
struct HostState {
    pending: Vec<u8>,
    flushed: Vec<u8>,
    session_active: bool,
    sessions_closed: usize,
}

/// In-memory host: buffers output and tracks a single session.
///
/// Clones share state, so a test can keep a handle while the run owns another.
#[derive(Debug, Clone, Default)]
pub struct BufferedHost {
    state: Arc<Mutex<HostState>>,
}

impl BufferedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with an open session
    pub fn with_session() -> Self {
        let host = Self::new();
        host.lock().session_active = true;
        host
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Output flushed so far
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.lock().flushed).into_owned()
    }

    /// Output written but not yet flushed
    pub fn pending(&self) -> String {
        String::from_utf8_lossy(&self.lock().pending).into_owned()
    }

    pub fn is_session_active(&self) -> bool {
        self.lock().session_active
    }

    pub fn sessions_closed(&self) -> usize {
        self.lock().sessions_closed
    }
}

impl HostHooks for BufferedHost {
    fn close_session_if_active(&self) -> Result<bool, RuntimeError> {
        let mut state = self.lock();
        if !state.session_active {
            return Ok(false);
        }
        state.session_active = false;
        state.sessions_closed += 1;
        Ok(true)
    }

    fn flush_output(&self) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.pending);
        state.flushed.extend_from_slice(&pending);
        Ok(())
    }

    fn write_output(&self, data: &[u8]) -> Result<(), RuntimeError> {
        self.lock().pending.extend_from_slice(data);
        Ok(())
    }
}
