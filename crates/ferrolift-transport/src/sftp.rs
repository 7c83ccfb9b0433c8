//! SFTP sessions over ssh2

use crate::fs::FileSystem;
use ferrolift_config::{Credentials, ServerIdentity};
use ferrolift_types::{DirEntry, Error, FileStat, Result};
use ssh2::{ErrorCode, Session, Sftp};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_PERMISSION_DENIED: i32 = 3;

/// Map an ssh2 error raised while touching `path`.
///
/// Session-level codes mean the transport is gone; SFTP status codes are
/// per-file failures.
fn map_error(error: &ssh2::Error, path: &Path) -> Error {
    match error.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => Error::NotFound {
            path: path.to_path_buf(),
        },
        ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => Error::PermissionDenied {
            path: path.to_path_buf(),
        },
        ErrorCode::SFTP(code) => Error::Io {
            message: format!("{}: sftp status {}: {}", path.display(), code, error.message()),
        },
        ErrorCode::Session(code) => Error::connection(format!(
            "session error {} at {}: {}",
            code,
            path.display(),
            error.message()
        )),
    }
}

fn connection_error(stage: &str, identity: &ServerIdentity, error: impl std::fmt::Display) -> Error {
    Error::connection(format!(
        "{} {}@{} failed: {}",
        stage,
        identity.user,
        identity.address(),
        error
    ))
}

/// Join a remote path, always with `/` separators
pub(crate) fn join_remote(base: &Path, relative: &Path) -> PathBuf {
    let base = base.to_string_lossy().replace('\\', "/");
    let relative = relative.to_string_lossy().replace('\\', "/");
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    if base.is_empty() {
        PathBuf::from(format!("/{}", relative))
    } else {
        PathBuf::from(format!("{}/{}", base, relative))
    }
}

fn stat_of(stat: &ssh2::FileStat) -> FileStat {
    FileStat::from_unix_secs(stat.size.unwrap_or(0), stat.mtime.unwrap_or(0))
}

/// [`FileSystem`] backed by an SFTP session
pub struct SftpFs {
    label: String,
    session: Session,
    sftp: Sftp,
}

impl std::fmt::Debug for SftpFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpFs").field("label", &self.label).finish()
    }
}

impl SftpFs {
    /// Dial, authenticate and open the SFTP subsystem.
    ///
    /// Host keys are not verified. Never retries; the caller owns the backoff.
    pub fn connect(identity: &ServerIdentity) -> Result<Self> {
        let credentials = identity.credentials().ok_or_else(|| {
            Error::config(format!("server '{}' has no credentials", identity.name))
        })?;

        let address = identity
            .address()
            .to_socket_addrs()
            .map_err(|e| connection_error("resolve", identity, e))?
            .next()
            .ok_or_else(|| connection_error("resolve", identity, "no address"))?;
        let tcp = TcpStream::connect_timeout(&address, identity.connect_timeout())
            .map_err(|e| connection_error("dial", identity, e))?;

        let mut session = Session::new().map_err(|e| connection_error("session", identity, e))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(identity.connect_timeout_millis());
        session
            .handshake()
            .map_err(|e| connection_error("handshake", identity, e))?;

        let user = identity.user.as_str();
        let auth = match &credentials {
            Credentials::KeyWithCert {
                key_file,
                cert_file,
            } => session.userauth_pubkey_file(user, Some(cert_file.as_path()), key_file, None),
            Credentials::Key { key_file } => session.userauth_pubkey_file(user, None, key_file, None),
            Credentials::Password { password } => session.userauth_password(user, password),
        };
        auth.map_err(|e| connection_error("authenticate", identity, e))?;
        if !session.authenticated() {
            return Err(connection_error("authenticate", identity, "rejected"));
        }

        // Transfers carry their own deadlines, but a call on a stalled peer
        // must still return so the session lock is released.
        session.set_timeout(identity.io_timeout_millis());
        if identity.keepalive_interval > 0 {
            session.set_keepalive(true, identity.keepalive_interval);
        }
        let sftp = session
            .sftp()
            .map_err(|e| connection_error("sftp subsystem", identity, e))?;

        Ok(Self {
            label: identity.name.clone(),
            session,
            sftp,
        })
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.sftp.stat(path).map(|s| s.is_dir()).unwrap_or(false)
    }
}

impl FileSystem for SftpFs {
    fn label(&self) -> &str {
        &self.label
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let entries = self.sftp.readdir(path).map_err(|e| match map_error(&e, path) {
            connection @ Error::Connection { .. } => connection,
            other => Error::scan(path, other.to_string()),
        })?;
        Ok(entries
            .into_iter()
            .map(|(entry_path, stat)| DirEntry {
                is_dir: stat.is_dir(),
                stat: stat_of(&stat),
                path: entry_path,
            })
            .collect())
    }

    fn stat(&self, path: &Path) -> Result<Option<FileStat>> {
        match self.sftp.stat(path) {
            Ok(stat) => Ok(Some(stat_of(&stat))),
            Err(e) => match map_error(&e, path) {
                Error::NotFound { .. } => Ok(None),
                other => Err(other),
            },
        }
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = self.sftp.open(path).map_err(|e| map_error(&e, path))?;
        Ok(Box::new(file))
    }

    fn create_write(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        let file = self.sftp.create(path).map_err(|e| map_error(&e, path))?;
        Ok(Box::new(file))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.sftp.unlink(path).map_err(|e| map_error(&e, path))
    }

    fn mkdir_all(&self, path: &Path) -> Result<()> {
        let mut current = PathBuf::new();
        for component in path.components() {
            match component {
                Component::RootDir => current.push("/"),
                Component::Normal(part) => current.push(part),
                _ => continue,
            }
            if current.as_os_str() == "/" || self.is_dir(&current) {
                continue;
            }
            if let Err(e) = self.sftp.mkdir(&current, 0o755) {
                // Another worker may have created it meanwhile.
                if !self.is_dir(&current) {
                    return Err(map_error(&e, &current));
                }
            }
        }
        Ok(())
    }

    fn set_mtime(&self, path: &Path, modified: SystemTime) -> Result<()> {
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let stat = ssh2::FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: None,
            atime: Some(secs),
            mtime: Some(secs),
        };
        self.sftp
            .setstat(path, stat)
            .map_err(|e| map_error(&e, path))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.sftp
            .rename(from, to, None)
            .map_err(|e| match map_error(&e, from) {
                connection @ Error::Connection { .. } => connection,
                other => Error::rename(from, to, other.to_string()),
            })
    }

    fn join(&self, base: &Path, relative: &Path) -> PathBuf {
        join_remote(base, relative)
    }

    fn ping(&self) -> Result<()> {
        self.sftp
            .realpath(Path::new("."))
            .map(|_| ())
            .map_err(|e| match map_error(&e, Path::new(".")) {
                connection @ Error::Connection { .. } => connection,
                other => Error::connection(other.to_string()),
            })
    }

    fn close(&self) {
        debug!("Closing session to {}", self.label);
        if let Err(e) = self.session.disconnect(None, "closing", None) {
            warn!("Error while closing session to {}: {}", self.label, e);
        }
    }
}
