//! Clinic share code generation.
//!
//! Share codes are what patients type to find a clinic, e.g. `7HKQ-2MXN-B4RP`.
//! The alphabet leaves out `I`, `O`, `0` and `1`.

use rand::Rng;

/// Characters a share code may contain.
pub const SHARE_CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of dash-separated groups.
pub const SHARE_CODE_GROUP_COUNT: usize = 3;

/// Characters per group.
pub const SHARE_CODE_GROUP_LENGTH: usize = 4;

const SEPARATOR: &str = "-";

/// Source of candidate share codes.
///
/// Uniqueness is enforced by the store, not by the generator.
pub trait ShareCodeGenerator: Send + Sync {
    /// Returns a new candidate share code.
    fn generate(&self) -> String;
}

/// Generator drawing each character uniformly from [`SHARE_CODE_ALPHABET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomShareCodeGenerator;

impl RandomShareCodeGenerator {
    /// Creates a generator.
    pub fn new() -> Self {
        Self
    }
}

impl ShareCodeGenerator for RandomShareCodeGenerator {
    fn generate(&self) -> String {
        let alphabet = SHARE_CODE_ALPHABET.as_bytes();
        let mut rng = rand::thread_rng();

        (0..SHARE_CODE_GROUP_COUNT)
            .map(|_| {
                (0..SHARE_CODE_GROUP_LENGTH)
                    .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }
}

/// Returns true if `code` has the shape of a generated share code.
pub fn is_valid_share_code(code: &str) -> bool {
    let groups: Vec<&str> = code.split(SEPARATOR).collect();
    groups.len() == SHARE_CODE_GROUP_COUNT
        && groups.iter().all(|group| {
            group.len() == SHARE_CODE_GROUP_LENGTH
                && group.chars().all(|c| SHARE_CODE_ALPHABET.contains(c))
        })
}
