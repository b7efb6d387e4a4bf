use crate::common::DEFAULT_FLAG;
use crate::errors::{ErrorKind, KvsError, KvsResult};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// How a persistent store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Open for reading and writing, creating the store if missing (`c`).
    #[default]
    Create,
    /// Always start from an empty store, discarding existing content (`n`).
    New,
    /// Open an existing store for reading and writing (`w`).
    Write,
    /// Open an existing store read-only (`r`).
    Read,
}

impl OpenMode {
    fn letter(&self) -> char {
        match self {
            OpenMode::Create => 'c',
            OpenMode::New => 'n',
            OpenMode::Write => 'w',
            OpenMode::Read => 'r',
        }
    }
}

/// Parsed dbm-style open flag such as `"c"`, `"r"` or `"wf"`.
///
/// The first letter selects the [`OpenMode`]. Modifier letters may follow:
/// `s` persists after every mutation, `f` and `u` are accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlag {
    mode: OpenMode,
    sync_writes: bool,
}

impl OpenFlag {
    pub fn new(mode: OpenMode) -> OpenFlag {
        OpenFlag {
            mode,
            sync_writes: false,
        }
    }

    /// Parses a flag string.
    pub fn parse(flag: &str) -> KvsResult<OpenFlag> {
        let mut chars = flag.chars();
        let mode = match chars.next() {
            Some('c') => OpenMode::Create,
            Some('n') => OpenMode::New,
            Some('w') => OpenMode::Write,
            Some('r') => OpenMode::Read,
            _ => return Err(invalid_flag(flag)),
        };

        let mut sync_writes = false;
        for modifier in chars {
            match modifier {
                's' => sync_writes = true,
                'f' | 'u' => {}
                _ => return Err(invalid_flag(flag)),
            }
        }

        Ok(OpenFlag { mode, sync_writes })
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == OpenMode::Read
    }

    /// `true` when the store must exist before opening.
    pub fn requires_existing(&self) -> bool {
        matches!(self.mode, OpenMode::Write | OpenMode::Read)
    }

    pub fn sync_writes(&self) -> bool {
        self.sync_writes
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> OpenFlag {
        self.sync_writes = sync_writes;
        self
    }
}

impl FromStr for OpenFlag {
    type Err = KvsError;

    fn from_str(flag: &str) -> Result<Self, Self::Err> {
        OpenFlag::parse(flag)
    }
}

impl Display for OpenFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mode.letter())?;
        if self.sync_writes {
            write!(f, "s")?;
        }
        Ok(())
    }
}

fn invalid_flag(flag: &str) -> KvsError {
    log::error!("Invalid open flag '{}'", flag);
    KvsError::new(
        &format!(
            "Invalid open flag '{}', expected one of c, n, w, r (default {})",
            flag, DEFAULT_FLAG
        ),
        ErrorKind::BackendOpenFailure,
    )
}
