//! Message keys - lexicographically sortable log identifiers
//!
//! Push keys are 20 characters:
//! - Characters 0-7:  Timestamp (milliseconds since Unix epoch, most significant first)
//! - Characters 8-19: Random suffix (incremented within the same millisecond)
//!
//! Both halves use an alphabet that is already in ASCII order, so comparing two
//! keys as plain strings compares them by creation time.

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Push key alphabet, in ASCII order
pub const PUSH_ALPHABET: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIMESTAMP_LEN: usize = 8;
const RANDOM_LEN: usize = 12;

/// Characters a key may not contain (they are path separators or reserved by backends)
const RESERVED_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

/// Backend-assigned log key; the total order of the log
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageKey(String);

impl MessageKey {
    /// Prefix of client-local temporary keys used by pending echoes
    pub const LOCAL_PREFIX: &'static str = "local-";

    /// Create a key from a raw string without validation
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Create a client-local temporary key
    pub fn local(nonce: &str) -> Self {
        Self(format!("{}{nonce}", Self::LOCAL_PREFIX))
    }

    /// Get the key as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the inner string
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Check if the key is empty (uninitialized)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if this is a client-local temporary key
    #[inline]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(Self::LOCAL_PREFIX)
    }

    /// Decode the creation timestamp of a push key
    ///
    /// Returns `None` for keys that were not produced by a [`KeyGenerator`].
    pub fn timestamp_millis(&self) -> Option<i64> {
        let bytes = self.0.as_bytes();
        if bytes.len() != TIMESTAMP_LEN + RANDOM_LEN {
            return None;
        }

        bytes[..TIMESTAMP_LEN].iter().try_fold(0i64, |acc, byte| {
            let digit = PUSH_ALPHABET.iter().position(|c| c == byte)?;
            Some(acc * 64 + digit as i64)
        })
    }

    /// Parse and validate a key
    pub fn parse(s: &str) -> Result<Self, KeyParseError> {
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }
        if let Some(c) = s.chars().find(|c| RESERVED_CHARS.contains(c)) {
            return Err(KeyParseError::ReservedCharacter(c));
        }
        Ok(Self(s.to_string()))
    }
}

/// Error when parsing a key from a string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    #[error("key is empty")]
    Empty,

    #[error("key contains reserved character '{0}'")]
    ReservedCharacter(char),
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for MessageKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl std::str::FromStr for MessageKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageKey::parse(s)
    }
}

/// Thread-safe push key generator
///
/// Keys from one generator are strictly increasing, even within a millisecond
/// or when the wall clock steps backwards.
pub struct KeyGenerator {
    state: Mutex<GeneratorState>,
}

struct GeneratorState {
    last_millis: i64,
    last_random: [u8; RANDOM_LEN],
}

impl KeyGenerator {
    /// Create a new generator
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GeneratorState {
                last_millis: 0,
                last_random: [0; RANDOM_LEN],
            }),
        }
    }

    /// Generate a new key stamped with the current time
    pub fn generate(&self) -> MessageKey {
        self.generate_at(current_millis())
    }

    /// Generate a new key for the given timestamp
    pub fn generate_at(&self, millis: i64) -> MessageKey {
        let mut state = self.state.lock();

        // Never go back in time, or keys stop sorting by creation order
        let mut millis = millis.max(state.last_millis);

        if millis == state.last_millis && !increment(&mut state.last_random) {
            // Suffix space for this millisecond is exhausted
            millis += 1;
            state.last_random = random_suffix();
        } else if millis != state.last_millis {
            state.last_random = random_suffix();
        }
        state.last_millis = millis;

        let mut key = String::with_capacity(TIMESTAMP_LEN + RANDOM_LEN);
        let mut encoded = [0u8; TIMESTAMP_LEN];
        let mut remaining = millis;
        for slot in encoded.iter_mut().rev() {
            *slot = PUSH_ALPHABET[(remaining % 64) as usize];
            remaining /= 64;
        }
        key.extend(encoded.iter().map(|&b| char::from(b)));
        key.extend(
            state
                .last_random
                .iter()
                .map(|&digit| char::from(PUSH_ALPHABET[digit as usize])),
        );

        MessageKey(key)
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Increment a base-64 digit array in place; false on overflow
fn increment(digits: &mut [u8; RANDOM_LEN]) -> bool {
    for digit in digits.iter_mut().rev() {
        if *digit < 63 {
            *digit += 1;
            return true;
        }
        *digit = 0;
    }
    false
}

fn random_suffix() -> [u8; RANDOM_LEN] {
    let mut rng = rand::thread_rng();
    let mut digits = [0u8; RANDOM_LEN];
    for digit in &mut digits {
        *digit = rng.gen_range(0..64);
    }
    digits
}

#[inline]
fn current_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
