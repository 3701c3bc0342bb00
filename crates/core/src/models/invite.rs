//! Invite code model

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Characters an invite code is drawn from
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of every invite code
pub const INVITE_CODE_LEN: usize = 8;

/// An 8-character room invite code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    /// Draw a fresh code uniformly from the alphabet
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..INVITE_CODE_LEN)
            .map(|_| INVITE_CODE_ALPHABET[rng.gen_range(0..INVITE_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Trim and uppercase raw user input
    pub fn normalize(input: &str) -> String {
        input.trim().to_uppercase()
    }

    /// Normalize and validate user input
    pub fn parse(input: &str) -> Result<Self> {
        let code = Self(Self::normalize(input));
        if !code.is_well_formed() {
            return Err(Error::InvalidInviteCode);
        }

        Ok(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(&self) -> bool {
        self.0.len() == INVITE_CODE_LEN && self.0.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b))
    }
}

impl std::fmt::Display for InviteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for InviteCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
