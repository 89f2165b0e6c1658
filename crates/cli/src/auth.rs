//! Password hashing and Ed25519-signed bearer tokens.
//!
//! Tokens are `base64url(payload).base64url(signature)` where the payload
//! is the JSON-serialized [`Claims`]. Verification checks the signature
//! and the expiry; the server re-fetches the user on every request so
//! role changes and deletions take effect immediately.

use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer as _, SigningKey};
use rand::RngCore as _;
use sha2::{Digest as _, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use pactum_core::{Role, User};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("malformed token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

const SALT_LEN: usize = 16;

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

fn digest_with_salt(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Hash a password with a fresh random salt. Output format is
/// `hex(salt)$hex(sha256(salt || password))`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    format!("{}${}", hex_encode(&salt), digest_with_salt(&salt, password))
}

/// Check a password against a stored hash. Malformed stored values
/// simply fail the check.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Some(salt) = hex_decode(salt_hex) else {
        return false;
    };
    digest_with_salt(&salt, password) == digest_hex
}

/// Bearer token payload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Issues and verifies bearer tokens with a single Ed25519 keypair.
pub struct TokenSigner {
    key: SigningKey,
}

impl TokenSigner {
    pub fn new(key: SigningKey) -> Self {
        TokenSigner { key }
    }

    /// Generate a fresh random keypair. Tokens signed with it become
    /// invalid when the process exits.
    pub fn generate() -> Self {
        TokenSigner {
            key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Load the signing key from a file containing the base64-encoded
    /// 32-byte seed, as written by `pactum keygen`.
    pub fn from_seed_file(path: &Path) -> Result<Self, AuthError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AuthError::InvalidKey(format!("{}: {}", path.display(), e)))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(contents.trim())
            .map_err(|e| AuthError::InvalidKey(format!("{}: {}", path.display(), e)))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AuthError::InvalidKey(format!("{}: expected 32 bytes", path.display())))?;
        Ok(TokenSigner {
            key: SigningKey::from_bytes(&seed),
        })
    }

    /// Write the base64-encoded seed to a file, mode 0600 on Unix.
    pub fn write_seed_file(&self, path: &Path) -> Result<(), AuthError> {
        let seed_b64 = base64::engine::general_purpose::STANDARD.encode(self.key.to_bytes());
        std::fs::write(path, seed_b64)
            .map_err(|e| AuthError::InvalidKey(format!("{}: {}", path.display(), e)))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path, perms) {
                tracing::warn!("failed to set permissions on {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    pub fn issue(&self, user: &User, ttl_secs: i64) -> String {
        self.issue_claims(Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            exp: OffsetDateTime::now_utc().unix_timestamp() + ttl_secs,
        })
    }

    fn issue_claims(&self, claims: Claims) -> String {
        // Claims has no non-serializable fields; serialization cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let signature = self.key.sign(&payload);
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (payload_b64, signature_b64) =
            token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        let signature =
            Signature::from_slice(&signature_bytes).map_err(|_| AuthError::InvalidToken)?;
        self.key
            .verifying_key()
            .verify_strict(&payload, &signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;
        if claims.exp <= OffsetDateTime::now_utc().unix_timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            role: Role::Normal,
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn password_round_trip() {
        let stored = hash_password("s3cret");
        assert!(verify_password("s3cret", &stored));
        assert!(!verify_password("s3cret!", &stored));
    }

    #[test]
    fn same_password_hashes_differently() {
        assert_ne!(hash_password("s3cret"), hash_password("s3cret"));
    }

    #[test]
    fn malformed_stored_hash_fails_closed() {
        assert!(!verify_password("anything", "not-a-hash"));
        assert!(!verify_password("anything", "zz$zz"));
    }

    #[test]
    fn token_round_trip() {
        let signer = TokenSigner::generate();
        let user = test_user();
        let token = signer.issue(&user, 3600);
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::Normal);
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = TokenSigner::generate();
        let token = signer.issue(&test_user(), -10);
        assert!(matches!(signer.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let signer = TokenSigner::generate();
        let token = signer.issue(&test_user(), 3600);
        let (_, signature) = token.split_once('.').unwrap();
        let forged_claims = serde_json::json!({
            "sub": Uuid::new_v4(),
            "username": "root",
            "role": "super_admin",
            "exp": i64::MAX,
        });
        let forged = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap()),
            signature
        );
        assert!(matches!(signer.verify(&forged), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn foreign_key_is_rejected() {
        let signer = TokenSigner::generate();
        let other = TokenSigner::generate();
        let token = other.issue(&test_user(), 3600);
        assert!(matches!(signer.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn seed_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.key");
        let signer = TokenSigner::generate();
        signer.write_seed_file(&path).unwrap();

        let reloaded = TokenSigner::from_seed_file(&path).unwrap();
        let token = signer.issue(&test_user(), 3600);
        reloaded.verify(&token).unwrap();
    }
}
