use crate::types::{TimezoneOffset, DAY_IN_MILLIS, SESSION_KEY_CONTEXT};
use hkdf::Hkdf;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

/// Derives 32 bytes of session key material from a wallet signature.
/// HKDF-SHA256 with the signature as input keying material and the fixed
/// application context as salt. Deterministic: same signature, same output.
pub fn derive_key_material(signature: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(SESSION_KEY_CONTEXT.as_bytes()), signature);
    let mut okm = [0u8; 32];
    hk.expand(&[], &mut okm)
        .expect("32 bytes is valid length");
    okm
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Midnight (in UTC milliseconds) of the local calendar day containing
/// `timestamp`, under the given timezone offset. `rem_euclid` keeps the
/// result correct for pre-epoch timestamps and negative offsets.
pub fn beginning_of_day(timestamp: i64, offset: TimezoneOffset) -> i64 {
    let local = timestamp - offset.millis();
    local - local.rem_euclid(DAY_IN_MILLIS) + offset.millis()
}

/// Last millisecond of the local calendar day containing `timestamp`.
pub fn end_of_day(timestamp: i64, offset: TimezoneOffset) -> i64 {
    beginning_of_day(timestamp, offset) + DAY_IN_MILLIS - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beginning_of_day_utc() {
        // 2023-01-02T03:04:05Z
        let ts = 1_672_628_645_000;
        let bod = beginning_of_day(ts, TimezoneOffset::UTC);
        assert_eq!(bod, 1_672_617_600_000); // 2023-01-02T00:00:00Z
        assert_eq!(bod % DAY_IN_MILLIS, 0);
        assert_eq!(end_of_day(ts, TimezoneOffset::UTC), bod + DAY_IN_MILLIS - 1);
    }

    #[test]
    fn beginning_of_day_with_offset_partitions_differently() {
        // 2023-01-02T00:30:00Z is still Jan 1st in UTC-2 (offset +120 min,
        // utc = local + offset).
        let ts = 1_672_619_400_000;
        let utc_bod = beginning_of_day(ts, TimezoneOffset::UTC);
        let minus_two_bod = beginning_of_day(ts, TimezoneOffset(120));
        assert_ne!(utc_bod, minus_two_bod);
        assert_eq!(utc_bod - minus_two_bod, DAY_IN_MILLIS - 2 * 3_600_000);
    }

    #[test]
    fn beginning_of_day_is_idempotent() {
        let ts = 1_672_628_645_123;
        for offset in [TimezoneOffset::UTC, TimezoneOffset(300), TimezoneOffset(-480)] {
            let bod = beginning_of_day(ts, offset);
            assert_eq!(beginning_of_day(bod, offset), bod);
            assert!(bod <= ts && ts - bod < DAY_IN_MILLIS);
        }
    }

    #[test]
    fn derive_key_material_is_deterministic() {
        let a = derive_key_material(b"signature bytes");
        let b = derive_key_material(b"signature bytes");
        let c = derive_key_material(b"other signature");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
