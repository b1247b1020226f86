//! Session marker carried in the `username` cookie.
//!
//! The marker is the authenticated subject passed through a keyless,
//! self-inverse letter rotation. It keeps the raw username out of casual
//! view and nothing more: it has no signature and no expiry, so anyone can
//! mint one. Routing only talks to the [`SessionCodec`] trait, so a signed
//! or server-side session can replace [`Rot13Codec`] without touching it.

use crate::error::DecodeError;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "username";

/// Encodes and decodes the username carried in the session cookie.
pub trait SessionCodec: Send + Sync {
    /// Encodes a username into a cookie value.
    fn encode(&self, username: &str) -> String;

    /// Decodes a cookie value back into a username.
    ///
    /// # Errors
    ///
    /// Returns a `DecodeError` if the value cannot be a session marker.
    fn decode(&self, value: &str) -> Result<String, DecodeError>;
}

/// Rotates ASCII letters by 13 places; every other character passes through.
///
/// Bytes a cookie value cannot carry (and `%` itself) are written as `%XX`
/// after rotation, so any username survives the trip through the cookie.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rot13Codec;

impl Rot13Codec {
    fn rotate(c: char) -> char {
        match c {
            'a'..='z' => rotate_within(c, b'a'),
            'A'..='Z' => rotate_within(c, b'A'),
            _ => c,
        }
    }
}

fn rotate_within(c: char, base: u8) -> char {
    let offset = c as u8 - base;
    char::from(base + (offset + 13) % 26)
}

impl SessionCodec for Rot13Codec {
    fn encode(&self, username: &str) -> String {
        let rotated: String = username.chars().map(Self::rotate).collect();
        let mut encoded = String::with_capacity(rotated.len());
        for b in rotated.bytes() {
            if is_cookie_octet(b) && b != b'%' {
                encoded.push(char::from(b));
            } else {
                encoded.push_str(&format!("%{b:02X}"));
            }
        }
        encoded
    }

    fn decode(&self, value: &str) -> Result<String, DecodeError> {
        if value.is_empty() {
            return Err(DecodeError::Empty);
        }
        if let Some(position) = value.bytes().position(|b| !is_cookie_octet(b)) {
            return Err(DecodeError::InvalidCharacter { position });
        }

        let bytes = value.as_bytes();
        let mut unescaped = Vec::with_capacity(bytes.len());
        let mut position = 0;
        while position < bytes.len() {
            if bytes[position] == b'%' {
                let byte = bytes
                    .get(position + 1..position + 3)
                    .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                    .ok_or(DecodeError::InvalidEscape { position })?;
                unescaped.push(byte);
                position += 3;
            } else {
                unescaped.push(bytes[position]);
                position += 1;
            }
        }

        let rotated = String::from_utf8(unescaped).map_err(|_| DecodeError::InvalidUtf8)?;
        Ok(rotated.chars().map(Self::rotate).collect())
    }
}

/// RFC 6265 `cookie-octet`.
fn is_cookie_octet(b: u8) -> bool {
    matches!(b, 0x21..=0x7E) && !matches!(b, b'"' | b',' | b';' | b'\\')
}

/// Finds the session cookie value in a `Cookie` header value.
///
/// Pairs are separated by `;` with optional surrounding whitespace. The
/// first `username=` pair wins.
#[must_use]
pub fn find_session_value(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
}

/// A session cookie to hand back to the browser after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    value: String,
}

impl SessionCookie {
    /// Creates the cookie carrying `subject`, encoded with `codec`.
    #[must_use]
    pub fn for_subject(codec: &dyn SessionCodec, subject: &str) -> Self {
        Self {
            value: codec.encode(subject),
        }
    }

    /// Returns the cookie name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        SESSION_COOKIE
    }

    /// Returns the encoded cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the path the cookie is scoped to.
    #[must_use]
    pub fn path(&self) -> &'static str {
        "/"
    }
}
