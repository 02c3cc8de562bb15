use std::fmt::{self, Display, Formatter};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, TryRngCore};

use crate::SessionError;

/// Number of random bytes in a session token.
pub const TOKEN_BYTES: usize = 32;

/// An opaque session token.
///
/// Tokens are [`TOKEN_BYTES`] bytes from the operating system random source,
/// encoded as unpadded URL-safe base64. That alphabet is valid verbatim in
/// both cookie values and header values, so the encoded form is written out
/// once and parsed back once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(String);

impl SessionToken {
    /// Session token generation routine that follows [OWASP recommendations].
    ///
    /// An unavailable random source is reported as
    /// [`SessionError::RandomSource`] and is not worth retrying.
    ///
    /// [OWASP recommendations]: https://cheatsheetseries.owasp.org/cheatsheets/Session_Management_Cheat_Sheet.html#session-id-entropy
    pub fn generate() -> Result<Self, SessionError> {
        let mut random_bytes = [0u8; TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut random_bytes)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(random_bytes)))
    }

    /// Parses an encoded token received from a client.
    ///
    /// Returns `None` unless `value` decodes to exactly [`TOKEN_BYTES`]
    /// bytes.
    pub fn parse(value: &str) -> Option<Self> {
        match URL_SAFE_NO_PAD.decode(value) {
            Ok(bytes) if bytes.len() == TOKEN_BYTES => Some(Self(value.to_string())),
            _ => None,
        }
    }

    /// Returns the encoded form of this token.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
