use crate::errors::CredmapError;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_FRAME_SIZE: (u16, u16) = (120, 30);

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, CredmapError>;
    fn write_string(&self, path: &Path, contents: &str) -> Result<(), CredmapError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), CredmapError>;
}

pub trait Terminal: Send + Sync {
    fn stdin_is_tty(&self) -> bool;
    fn write_line(&self, line: &str) -> Result<(), CredmapError>;
    fn draw(&self, frame: &str) -> Result<(), CredmapError>;
    /// Next input line without its terminator, `None` at end of input.
    fn read_line(&self) -> Result<Option<String>, CredmapError>;
    fn size(&self) -> (u16, u16);
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, CredmapError> {
        std::fs::read_to_string(path)
            .map_err(|e| CredmapError::Io(format!("{}: {e}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), CredmapError> {
        std::fs::write(path, contents)
            .map_err(|e| CredmapError::Io(format!("{}: {e}", path.display())))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), CredmapError> {
        std::fs::create_dir_all(path).map_err(|e| CredmapError::Io(e.to_string()))
    }
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn stdin_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdin())
    }

    fn write_line(&self, line: &str) -> Result<(), CredmapError> {
        use std::io::Write;
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| CredmapError::Io(e.to_string()))
    }

    fn draw(&self, frame: &str) -> Result<(), CredmapError> {
        self.write_line(frame)
    }

    fn read_line(&self) -> Result<Option<String>, CredmapError> {
        let mut line = String::new();
        let read = std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| CredmapError::Io(e.to_string()))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    fn size(&self) -> (u16, u16) {
        if !self.stdin_is_tty() {
            return DEFAULT_FRAME_SIZE;
        }
        crossterm::terminal::size().unwrap_or(DEFAULT_FRAME_SIZE)
    }
}

pub struct ProductionRuntime {
    pub file_system: Arc<dyn FileSystem>,
    pub terminal: Arc<dyn Terminal>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            file_system: Arc::new(ProductionFileSystem),
            terminal: Arc::new(ProductionTerminal),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    dirs: Arc<Mutex<Vec<PathBuf>>>,
    fail_next: Arc<Mutex<Option<CredmapError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        lock(&fs.files).insert(path.into(), contents.into());
        fs
    }

    pub fn set_fail_next(&self, error: CredmapError) {
        *lock(&self.fail_next) = Some(error);
    }

    pub fn file(&self, path: &Path) -> Option<String> {
        lock(&self.files).get(path).cloned()
    }

    pub fn created_dirs(&self) -> Vec<PathBuf> {
        lock(&self.dirs).clone()
    }

    fn maybe_fail(&self) -> Result<(), CredmapError> {
        if let Some(err) = lock(&self.fail_next).take() {
            return Err(err);
        }
        Ok(())
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, CredmapError> {
        self.maybe_fail()?;
        lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| CredmapError::Io(format!("missing file {}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), CredmapError> {
        self.maybe_fail()?;
        lock(&self.files).insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), CredmapError> {
        self.maybe_fail()?;
        lock(&self.dirs).push(path.to_path_buf());
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    pub is_tty: bool,
    input: Arc<Mutex<VecDeque<String>>>,
    writes: Arc<Mutex<Vec<String>>>,
    draws: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn new(is_tty: bool) -> Self {
        Self {
            is_tty,
            ..Self::default()
        }
    }

    /// Queues input lines returned by `read_line` in order.
    pub fn with_input<I, S>(is_tty: bool, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terminal = Self::new(is_tty);
        lock(&terminal.input).extend(lines.into_iter().map(Into::into));
        terminal
    }

    pub fn written_lines(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }

    pub fn drawn_frames(&self) -> Vec<String> {
        lock(&self.draws).clone()
    }
}

impl Terminal for FakeTerminal {
    fn stdin_is_tty(&self) -> bool {
        self.is_tty
    }

    fn write_line(&self, line: &str) -> Result<(), CredmapError> {
        lock(&self.writes).push(line.to_string());
        Ok(())
    }

    fn draw(&self, frame: &str) -> Result<(), CredmapError> {
        lock(&self.draws).push(frame.to_string());
        Ok(())
    }

    fn read_line(&self) -> Result<Option<String>, CredmapError> {
        Ok(lock(&self.input).pop_front())
    }

    fn size(&self) -> (u16, u16) {
        DEFAULT_FRAME_SIZE
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
