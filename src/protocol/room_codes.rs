use uuid::Uuid;

use super::types::MIN_ROOM_CODE_LENGTH;

/// Generate an uppercase alphanumeric room code by taking a prefix of a
/// fresh UUID. Hex digits only, so the result always satisfies
/// [`validate_room_code`].
pub fn generate_room_code(length: usize) -> String {
    let length = length.max(MIN_ROOM_CODE_LENGTH);
    let mut code = String::with_capacity(length);
    while code.len() < length {
        let hex = Uuid::new_v4().simple().to_string().to_uppercase();
        let take = (length - code.len()).min(hex.len());
        code.push_str(&hex[..take]);
    }
    code
}

/// Uppercase and trim a client-supplied room code.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Room codes are uppercase `[A-Z0-9]`, at least six characters.
pub fn validate_room_code(code: &str) -> bool {
    code.len() >= MIN_ROOM_CODE_LENGTH
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..32 {
            let code = generate_room_code(8);
            assert_eq!(code.len(), 8);
            assert!(validate_room_code(&code), "invalid code {code}");
        }
    }

    #[test]
    fn short_requests_are_padded_to_minimum() {
        let code = generate_room_code(2);
        assert_eq!(code.len(), MIN_ROOM_CODE_LENGTH);
    }

    #[test]
    fn normalization_uppercases_and_trims() {
        assert_eq!(normalize_room_code("  abc123xy "), "ABC123XY");
    }

    #[test]
    fn validation_rejects_bad_codes() {
        assert!(!validate_room_code("AB12"));
        assert!(!validate_room_code("abc123"));
        assert!(!validate_room_code("ABC 123"));
        assert!(validate_room_code("ABC12345"));
    }
}
