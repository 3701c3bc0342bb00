//! Invite code sources

use crate::models::InviteCode;

/// Supplies candidate invite codes to the pairing protocol
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> InviteCode;
}

/// Uniform random codes from the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self) -> InviteCode {
        InviteCode::generate(&mut rand::thread_rng())
    }
}

/// Replays a fixed list of codes, cycling when exhausted
#[cfg(test)]
pub(crate) struct ScriptedCodes {
    codes: Vec<InviteCode>,
    next: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptedCodes {
    pub(crate) fn new(codes: &[&str]) -> Self {
        Self {
            codes: codes
                .iter()
                .map(|c| InviteCode::parse(c).expect("scripted code must be well formed"))
                .collect(),
            next: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub(crate) fn drawn(&self) -> usize {
        self.next.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl CodeSource for ScriptedCodes {
    fn next_code(&self) -> InviteCode {
        let i = self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.codes[i % self.codes.len()].clone()
    }
}
