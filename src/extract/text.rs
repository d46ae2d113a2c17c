//! Plain-text decoding

/// Decode bytes as UTF-8, falling back to a lossy decode for other
/// encodings. Undecodable bytes become replacement characters rather
/// than being dropped.
pub fn decode(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(data).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_utf8() {
        assert_eq!(decode("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn test_invalid_bytes_are_replaced_not_dropped() {
        let decoded = decode(&[b'a', 0xff, b'b']);
        assert_eq!(decoded, "a\u{FFFD}b");
        assert_eq!(decoded.chars().count(), 3);
    }
}
