// Session store: the `{access_token, base_url}` pair persisted between
// invocations in `~/.pms/config`.
//
// The file is an INI document with an `[auth]` section, the same shape the
// Python client wrote with `configparser`, so existing files keep working.
// Sections and keys we do not own are carried over untouched on rewrite.

use crate::error::{PmsError, Result};
use ini::Ini;
use std::fs::{self, File};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://localhost:4004";

const AUTH_SECTION: &str = "auth";
const TOKEN_KEY: &str = "access_token";
const BASE_URL_KEY: &str = "base_url";

/// Who we talk to and as whom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub base_url: Option<String>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Session {
            access_token: Some(access_token.into()),
            base_url: Some(base_url.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Stored base URL, or `DEFAULT_BASE_URL` when none is configured.
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn is_logged_in(&self) -> bool {
        self.access_token.is_some()
    }
}

/// `~/.pms/config`, falling back to the working directory when the home
/// directory cannot be determined.
pub fn default_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(".pms").join("config")
}

/// Read the session at `path`. A missing file is an empty session.
pub fn load(path: &Path) -> Result<Session> {
    Ok(SessionFile::open(path)?.session)
}

/// Write `session` to `path`, creating the parent directory if needed.
/// Absent fields are removed from the `[auth]` section. This is a plain
/// overwrite; concurrent writers race and the last one wins.
pub fn save(path: &Path, session: &Session) -> Result<()> {
    let mut file = SessionFile::open(path)?;
    file.session = session.clone();
    file.write()
}

/// The session file as read from disk: the parsed `[auth]` fields plus the
/// whole document, so one read can be followed by one write that keeps
/// foreign sections.
pub struct SessionFile {
    path: PathBuf,
    ini: Ini,
    exists: bool,
    session: Session,
}

impl SessionFile {
    pub fn open(path: &Path) -> Result<Self> {
        let Some(ini) = read_ini(path)? else {
            debug!(path = %path.display(), "no session file");
            return Ok(SessionFile {
                path: path.to_path_buf(),
                ini: Ini::new(),
                exists: false,
                session: Session::default(),
            });
        };
        let auth = ini.section(Some(AUTH_SECTION));
        let field = |key: &str| {
            auth.and_then(|props| props.get(key))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let session = Session {
            access_token: field(TOKEN_KEY),
            base_url: field(BASE_URL_KEY),
        };
        debug!(
            path = %path.display(),
            logged_in = session.is_logged_in(),
            "loaded session"
        );
        Ok(SessionFile {
            path: path.to_path_buf(),
            ini,
            exists: true,
            session,
        })
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Record a fresh login.
    pub fn set_login(&mut self, token: &str, base_url: &str) {
        self.session = Session::new(token, base_url);
    }

    pub fn clear_token(&mut self) {
        self.session.access_token = None;
    }

    /// Write the document back with the current `[auth]` fields.
    pub fn write(mut self) -> Result<()> {
        for (key, value) in [
            (TOKEN_KEY, self.session.access_token.as_deref()),
            (BASE_URL_KEY, self.session.base_url.as_deref()),
        ] {
            match value {
                Some(v) => {
                    self.ini.with_section(Some(AUTH_SECTION)).set(key, v);
                }
                None => {
                    self.ini.delete_from(Some(AUTH_SECTION), key);
                }
            }
        }
        write_ini(&self.path, &self.ini)?;
        debug!(path = %self.path.display(), "saved session");
        Ok(())
    }
}

fn read_ini(path: &Path) -> Result<Option<Ini>> {
    if !path.exists() {
        return Ok(None);
    }
    Ini::load_from_file(path)
        .map(Some)
        .map_err(|source| PmsError::Session {
            path: path.to_path_buf(),
            source,
        })
}

fn write_ini(path: &Path, ini: &Ini) -> Result<()> {
    // Only a directory we create ourselves gets tightened.
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty() && !d.exists()) {
        fs::create_dir_all(dir)?;
        restrict_permissions(dir, 0o700)?;
    }
    let mut file = open_private(path)?;
    ini.write_to(&mut file)?;
    Ok(())
}

/// Open `path` for writing so the token never lands in a file readable by
/// others: new files are created 0600 and existing ones are tightened
/// before truncation.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;

    if path.exists() {
        restrict_permissions(path, 0o600)?;
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    File::create(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

/// File-backed session store bound to one path. Each operation reads the
/// file at most once and writes it at most once.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionStore { path: path.into() }
    }

    /// Store at `~/.pms/config`.
    pub fn open_default() -> Self {
        SessionStore::new(default_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> Result<SessionFile> {
        SessionFile::open(&self.path)
    }

    pub fn load(&self) -> Result<Session> {
        load(&self.path)
    }

    /// Persist a fresh login.
    pub fn save(&self, token: &str, base_url: &str) -> Result<()> {
        let mut file = self.open()?;
        file.set_login(token, base_url);
        file.write()
    }

    pub fn get_token(&self) -> Result<Option<String>> {
        Ok(self.load()?.access_token)
    }

    pub fn get_base_url(&self) -> Result<String> {
        Ok(self.load()?.base_url().to_string())
    }

    /// Remove the token but keep the configured base URL. No file, no-op.
    pub fn clear_token(&self) -> Result<()> {
        let mut file = self.open()?;
        if !file.exists() {
            return Ok(());
        }
        file.clear_token();
        file.write()?;
        debug!(path = %self.path.display(), "cleared token");
        Ok(())
    }
}
