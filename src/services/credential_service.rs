use crate::models::{AuthMethod, AuthMethodSet, ConnectOptions, HostRecord};
use crate::utils::error::{LwshellError, Result};
use russh::keys::PrivateKey;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Turns a stored host record into the authentication methods to offer.
pub struct CredentialService;

impl CredentialService {
    /// Resolve the auth methods for one connection attempt.
    ///
    /// An override key path replaces the record's key path entirely. A key,
    /// when configured, is offered before the password.
    pub fn resolve(record: &HostRecord, options: &ConnectOptions) -> Result<AuthMethodSet> {
        let key_path = options
            .key_path_override()
            .map(Path::to_path_buf)
            .or_else(|| record.key_path().map(PathBuf::from));

        let mut methods = Vec::new();

        if let Some(path) = key_path {
            let path = expand_home(&path);
            let key = Self::load_unencrypted_key(&path)?;
            tracing::debug!("Loaded private key {:?} ({})", path, key.algorithm().as_str());
            methods.push(AuthMethod::PublicKey {
                path,
                key: Arc::new(key),
            });
        }

        if let Some(password) = record.password() {
            methods.push(AuthMethod::Password(password.to_string()));
        }

        if methods.is_empty() {
            return Err(LwshellError::NoCredentials);
        }

        let set = AuthMethodSet::new(methods);
        tracing::debug!("Resolved auth methods for {}: {:?}", record.id, set.names());
        Ok(set)
    }

    /// Read and parse a private key that has no passphrase.
    pub fn load_unencrypted_key(path: &Path) -> Result<PrivateKey> {
        let data = std::fs::read_to_string(path).map_err(|source| {
            LwshellError::KeyFileUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;

        russh::keys::decode_secret_key(data.trim(), None).map_err(|source| {
            if is_passphrase_error(&source) {
                LwshellError::EncryptedKeyUnsupported {
                    path: path.to_path_buf(),
                    source,
                }
            } else {
                LwshellError::KeyRead {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}

fn is_passphrase_error(err: &russh::keys::Error) -> bool {
    if matches!(err, russh::keys::Error::KeyIsEncrypted) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    message.contains("passphrase") || message.contains("encrypted")
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
