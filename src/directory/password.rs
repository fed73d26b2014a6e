use argon2::Argon2;
use password_hash::{PasswordHash, PasswordVerifier};
use tracing::warn;

const ARGON2_SCHEME: &str = "{ARGON2}";

/// Checks a presented password against a stored `userPassword` value.
///
/// Values prefixed with `{ARGON2}` carry a PHC formatted hash, all other values are compared as
/// clear text.
pub fn verify(stored: &str, password: &[u8]) -> bool {
    if password.is_empty() {
        return false;
    }

    let scheme = stored.get(..ARGON2_SCHEME.len());
    if scheme.map_or(false, |scheme| scheme.eq_ignore_ascii_case(ARGON2_SCHEME)) {
        let hash = match PasswordHash::new(&stored[ARGON2_SCHEME.len()..]) {
            Ok(hash) => hash,
            Err(err) => {
                warn!("Ignoring malformed password hash: {}", err);
                return false;
            }
        };

        return Argon2::default()
            .verify_password(password, &hash)
            .is_ok();
    }

    return stored.as_bytes() == password;
}
