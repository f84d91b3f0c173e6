//! Bearer-token and verification-code generation.
//!
//! Both draw from the operating system CSPRNG.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Random bytes behind every bearer token.
pub const TOKEN_BYTES: usize = 32;

/// Generate a bearer token: 32 random bytes, lowercase hex (64 chars).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a numeric code of `length` ASCII digits.
pub fn generate_code(length: usize) -> String {
    (0..length)
        .map(|_| char::from(b'0' + OsRng.gen_range(0..10u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_tokens_are_distinct() {
        let tokens: HashSet<String> = (0..64).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 64);
    }

    #[test]
    fn test_code_shape() {
        for length in [4, 6, 12] {
            let code = generate_code(length);
            assert_eq!(code.len(), length);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_code_uses_all_digits() {
        let seen: HashSet<char> = (0..200).flat_map(|_| generate_code(6).chars().collect::<Vec<_>>()).collect();
        assert_eq!(seen.len(), 10);
    }
}
