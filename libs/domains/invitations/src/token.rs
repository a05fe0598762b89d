//! Random opaque tokens.

use rand::RngExt;
use rand::distr::Alphanumeric;

/// Length of a pending-action confirm token.
pub const CONFIRM_TOKEN_LEN: usize = 48;
/// Length of a per-invite link token.
pub const INVITE_TOKEN_LEN: usize = 32;

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn confirm_token() -> String {
    random_alphanumeric(CONFIRM_TOKEN_LEN)
}

pub fn invite_token() -> String {
    random_alphanumeric(INVITE_TOKEN_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = confirm_token();
        assert_eq!(token.len(), CONFIRM_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(invite_token().len(), INVITE_TOKEN_LEN);
    }

    #[test]
    fn test_tokens_differ() {
        assert_ne!(confirm_token(), confirm_token());
    }
}
