use russh::keys::PrivateKey;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A single resolved SSH authentication method
#[derive(Clone)]
pub enum AuthMethod {
    /// Public key authentication with an already-parsed, unencrypted key
    PublicKey { path: PathBuf, key: Arc<PrivateKey> },
    /// Password authentication
    Password(String),
}

impl AuthMethod {
    pub fn is_password(&self) -> bool {
        matches!(self, Self::Password(_))
    }

    pub fn is_public_key(&self) -> bool {
        matches!(self, Self::PublicKey { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PublicKey { .. } => "publickey",
            Self::Password(_) => "password",
        }
    }
}

// Never print the password or key material.
impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PublicKey { path, key } => f
                .debug_struct("PublicKey")
                .field("path", path)
                .field("algorithm", &key.algorithm().as_str())
                .finish(),
            Self::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// Ordered list of methods to offer the server.
///
/// Servers evaluate methods in the order they are offered, so key-based
/// methods always precede the password.
#[derive(Debug, Clone)]
pub struct AuthMethodSet {
    methods: Vec<AuthMethod>,
}

impl AuthMethodSet {
    pub fn new(mut methods: Vec<AuthMethod>) -> Self {
        // Stable sort keeps relative order within each kind.
        methods.sort_by_key(|m| m.is_password());
        Self { methods }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuthMethod> {
        self.methods.iter()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Method names in offer order, e.g. `["publickey", "password"]`.
    pub fn names(&self) -> Vec<&'static str> {
        self.methods.iter().map(AuthMethod::name).collect()
    }
}
