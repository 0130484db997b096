//! Property tests for the identifier codec.

use proptest::prelude::*;

use staffdesk_core::AccessError;
use staffdesk_idcodec::{CodecError, IdCodec, MasterKey};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn codec() -> IdCodec {
    IdCodec::new(MasterKey::from_bytes([0x5A; 32]))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Property: decode(encode(x)) == x for every u64 under the same purpose.
    #[test]
    fn round_trip(id in any::<u64>()) {
        let protector = codec().protector("EmployeeIdRouteValue").unwrap();
        let token = protector.encode(id).unwrap();
        prop_assert_eq!(protector.decode(&token), Ok(id));
    }

    /// Property: a token minted for one purpose never decodes under another.
    #[test]
    fn purpose_isolation(id in any::<u64>(), a in "[A-Za-z]{1,16}", b in "[A-Za-z]{1,16}") {
        prop_assume!(a != b);
        let codec = codec();
        let token = codec.encode(&a, id).unwrap();
        prop_assert_eq!(codec.decode(&b, &token), Err(CodecError::InvalidToken));
    }

    /// Property: replacing any single character of a valid token is detected.
    #[test]
    fn single_character_tamper_is_detected(
        id in any::<u64>(),
        position in any::<prop::sample::Index>(),
        replacement in any::<prop::sample::Index>(),
    ) {
        let protector = codec().protector("EmployeeIdRouteValue").unwrap();
        let token = protector.encode(id).unwrap();

        let mut bytes = token.into_bytes();
        let at = position.index(bytes.len());
        let mut candidate = ALPHABET[replacement.index(ALPHABET.len())];
        if candidate == bytes[at] {
            candidate = if candidate == b'A' { b'B' } else { b'A' };
        }
        bytes[at] = candidate;
        let tampered = String::from_utf8(bytes).unwrap();

        prop_assert_eq!(protector.decode(&tampered), Err(CodecError::InvalidToken));
    }

    /// Property: arbitrary strings never panic the decoder.
    #[test]
    fn arbitrary_input_never_panics(input in ".{0,120}") {
        let protector = codec().protector("EmployeeIdRouteValue").unwrap();
        let _ = protector.decode(&input);
    }
}

#[test]
fn invalid_token_surfaces_as_not_found() {
    let err: AccessError = codec()
        .decode("EmployeeIdRouteValue", "not-a-token")
        .unwrap_err()
        .into();
    assert_eq!(err, AccessError::InvalidToken);
    assert!(err.is_concealed_as_not_found());
}

#[test]
fn protectors_share_across_threads() {
    let protector = codec().protector("EmployeeIdRouteValue").unwrap();
    let handles: Vec<_> = (0..4u64)
        .map(|n| {
            let p = protector.clone();
            std::thread::spawn(move || {
                let token = p.encode(n * 1000).unwrap();
                p.decode(&token).unwrap()
            })
        })
        .collect();

    let mut results: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort();
    assert_eq!(results, vec![0, 1000, 2000, 3000]);
}
