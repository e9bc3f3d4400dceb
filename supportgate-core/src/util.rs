//! Small shared helpers with no external crate worth pulling in for them.

/// Minimal hex encode/decode, mirrored from the teacher's inline module —
/// no external crate needed beyond what signature verification already uses.
pub mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err("odd-length hex string".to_string());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&s[i..i + 2], 16)
                    .map_err(|e| format!("invalid hex at position {i}: {e}"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::hex;

    #[test]
    fn test_hex_roundtrip() {
        let original = vec![0u8, 1, 15, 16, 255];
        let encoded = hex::encode(&original);
        let decoded = hex::decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_hex_decode_rejects_odd_length() {
        assert!(hex::decode("abc").is_err());
    }
}
