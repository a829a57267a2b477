use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tokio::net::UnixListener;
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// A connected endpoint stream. Implements `AsyncRead + AsyncWrite`.
pub type IpcStream = tokio::net::UnixStream;

/// Directory that holds endpoints and liveness flags named without a path.
///
/// `$XDG_RUNTIME_DIR` when set, otherwise the system temp directory.
pub fn runtime_dir() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir(),
    }
}

/// Resolve a pipe name to the socket path it is served on.
///
/// A name containing a path separator is taken verbatim; a bare name becomes
/// `<runtime dir>/<name>.sock`.
pub fn resolve_endpoint(name: &str) -> PathBuf {
    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        PathBuf::from(name)
    } else {
        runtime_dir().join(format!("{name}.sock"))
    }
}

/// A bound endpoint accepting one connection per request.
///
/// The socket file is removed on drop, unless the path has been replaced by
/// something else in the meantime.
pub struct EndpointListener {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl EndpointListener {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind the endpoint named `name` (see [`resolve_endpoint`]).
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(name: &str) -> Result<Self> {
        Self::bind_path(resolve_endpoint(name))
    }

    /// Bind and listen on a filesystem-path Unix domain socket.
    ///
    /// If the path already exists and is a socket nobody listens on, it is
    /// removed first (stale socket left behind by a crashed server). A socket
    /// with a live listener is refused with `AddrInUse`.
    pub fn bind_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bind_err = |source| TransportError::Bind {
            path: path.clone(),
            source,
        };

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(bind_err)?;
            }
        }

        // Only a socket nobody answers on is stale; never remove other files.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if metadata.file_type().is_socket() {
                match std::os::unix::net::UnixStream::connect(&path) {
                    Ok(_) => {
                        return Err(bind_err(std::io::Error::new(
                            std::io::ErrorKind::AddrInUse,
                            "another server is listening on this endpoint",
                        )));
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::ConnectionRefused => {
                        debug!(?path, "removing stale socket");
                        std::fs::remove_file(&path).map_err(bind_err)?;
                    }
                    Err(err) => return Err(bind_err(err)),
                }
            } else {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;

        std::fs::set_permissions(
            &path,
            std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE),
        )
        .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "endpoint listening");

        Ok(Self {
            listener,
            path,
            created_inode: Some((created.dev(), created.ino())),
        })
    }

    /// Wait for the next client connection.
    pub async fn accept(&self) -> Result<IpcStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        match stream.peer_cred() {
            Ok(cred) => debug!(path = ?self.path, pid = ?cred.pid(), uid = cred.uid(), "accepted connection"),
            Err(_) => debug!(path = ?self.path, "accepted connection"),
        }
        Ok(stream)
    }

    /// The path this endpoint is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for EndpointListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointListener")
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for EndpointListener {
    fn drop(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(
                    path = ?self.path,
                    "socket path identity changed; skipping cleanup"
                );
            }
        }
    }
}

/// Connect to the endpoint named `name`.
pub async fn connect(name: &str) -> Result<IpcStream> {
    let path = resolve_endpoint(name);
    let stream = tokio::net::UnixStream::connect(&path)
        .await
        .map_err(|source| TransportError::Connect {
            path: path.clone(),
            source,
        })?;
    debug!(?path, "connected to endpoint");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn bare_name_resolves_under_runtime_dir() {
        let path = resolve_endpoint("svc.command");
        assert_eq!(path, runtime_dir().join("svc.command.sock"));
    }

    #[test]
    fn path_like_name_is_taken_verbatim() {
        let path = resolve_endpoint("/tmp/custom/svc.sock");
        assert_eq!(path, PathBuf::from("/tmp/custom/svc.sock"));
    }

    #[tokio::test]
    async fn bind_accept_connect() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("test.sock");
        let name = sock_path.to_str().unwrap().to_string();

        let listener = EndpointListener::bind(&name).unwrap();
        assert!(sock_path.exists());

        let client = tokio::spawn(async move {
            let mut client = connect(&name).await.unwrap();
            client.write_all(b"hello").await.unwrap();
        });

        let mut server = listener.accept().await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        client.await.unwrap();

        drop(listener);
        assert!(
            !sock_path.exists(),
            "socket file should be cleaned up on drop"
        );
    }

    #[tokio::test]
    async fn connect_without_listener_is_not_listening() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("missing.sock");
        let err = connect(name.to_str().unwrap()).await.unwrap_err();
        assert!(err.is_not_listening(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = EndpointListener::bind(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[tokio::test]
    async fn bind_default_permissions_hardened() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("perm.sock");

        let _listener = EndpointListener::bind_path(&sock_path).unwrap();
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[tokio::test]
    async fn bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("stale.sock");

        // Simulate a crash: the socket file outlives its listener.
        drop(std::os::unix::net::UnixListener::bind(&sock_path).unwrap());
        assert!(sock_path.exists());

        let second = EndpointListener::bind_path(&sock_path);
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn bind_refuses_live_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("live.sock");

        let first = EndpointListener::bind_path(&sock_path).unwrap();
        let second = EndpointListener::bind_path(&sock_path);
        match second {
            Err(TransportError::Bind { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::AddrInUse);
            }
            other => panic!("expected AddrInUse, got {other:?}"),
        }

        // The first listener still owns the endpoint.
        let client = tokio::spawn({
            let name = sock_path.to_str().unwrap().to_string();
            async move { connect(&name).await.unwrap() }
        });
        first.accept().await.unwrap();
        client.await.unwrap();
    }

    #[tokio::test]
    async fn bind_rejects_existing_non_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = EndpointListener::bind_path(&sock_path);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[tokio::test]
    async fn drop_does_not_remove_replaced_path() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("drop.sock");

        let listener = EndpointListener::bind_path(&sock_path).unwrap();
        std::fs::remove_file(&sock_path).unwrap();
        std::fs::write(&sock_path, b"replacement-file").unwrap();

        drop(listener);
        assert!(
            sock_path.exists(),
            "drop must not remove path if inode identity changed"
        );
    }
}
