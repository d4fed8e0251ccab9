//! Video stream resource: a file path plus the playback instances made from it.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::clock::PlaybackClock;
use crate::config::DecoderConfig;
use crate::decoder::DecodeSession;
use crate::error::DecodeError;

/// A video file the host can instantiate playbacks from.
///
/// Holds its own probe session to validate the file. Every playback gets a
/// freshly opened session so instances never share decoder state.
pub struct VideoStream {
    path: Option<PathBuf>,
    session: DecodeSession,
}

impl VideoStream {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            path: None,
            session: DecodeSession::new(config),
        }
    }

    /// Point the stream at a file and probe it. An empty path just closes.
    pub fn set_file(&mut self, path: impl AsRef<Path>) -> Result<(), DecodeError> {
        let path = path.as_ref();
        self.session.close();

        if path.as_os_str().is_empty() {
            self.path = None;
            return Ok(());
        }

        self.path = Some(path.to_path_buf());
        if let Err(e) = self.session.open(path) {
            warn!("Failed to open video file {}: {}", path.display(), e);
            return Err(e);
        }
        Ok(())
    }

    pub fn file(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// The probe session, for metadata queries
    pub fn session(&self) -> &DecodeSession {
        &self.session
    }

    /// Takes effect for playbacks instantiated afterwards
    pub fn set_use_hardware_acceleration(&mut self, enabled: bool) {
        self.session.set_use_hardware_acceleration(enabled);
    }

    /// New playback backed by its own decode session.
    ///
    /// When the stream isn't open, or the playback session fails to open, the
    /// returned clock has no source and ignores play requests.
    pub fn instantiate_playback(&self) -> PlaybackClock<DecodeSession> {
        let Some(path) = self.path.as_deref().filter(|_| self.session.is_open()) else {
            return PlaybackClock::new();
        };

        let mut session = DecodeSession::new(self.session.config().clone());
        match session.open(path) {
            Ok(()) => {
                info!("Created playback for {}", path.display());
                PlaybackClock::with_source(session)
            }
            Err(e) => {
                warn!("Failed to create playback decoder for {}: {}", path.display(), e);
                PlaybackClock::new()
            }
        }
    }
}

impl Default for VideoStream {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}
