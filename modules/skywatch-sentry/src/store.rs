use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use skywatch_common::{SkywatchError, WatchState};

/// Durable storage for one account's monitoring state. The engine defines
/// the record shape and these two operations; the engine does not care what
/// sits behind them. Implementations must make `save` all-or-nothing so a
/// crash mid-write leaves prior state untouched.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<WatchState, SkywatchError>;

    /// Persist the whole state. Applies the evaluated-notification cap
    /// before writing.
    fn save(&self, state: &mut WatchState) -> Result<(), SkywatchError>;
}

/// JSON-file-backed store. Writes go to a temp file in the same directory
/// and land via rename, so readers only ever see a complete document.
pub struct JsonStateStore {
    path: PathBuf,
    evaluated_cap: usize,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>, evaluated_cap: usize) -> Self {
        Self {
            path: path.into(),
            evaluated_cap,
        }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<WatchState, SkywatchError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet, starting empty");
                return Ok(WatchState::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw).map_err(|e| {
            SkywatchError::State(format!(
                "state file {} is unreadable: {e}",
                self.path.display()
            ))
        })
    }

    fn save(&self, state: &mut WatchState) -> Result<(), SkywatchError> {
        state.truncate_evaluated(self.evaluated_cap);

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, state)?;
        file.flush()?;
        file.persist(&self.path)
            .map_err(|e| SkywatchError::State(e.to_string()))?;
        Ok(())
    }
}
