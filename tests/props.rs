//! Property-based invariants for the codecs and the signature chain.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

use macaroon_pass::serialization::{self, base64_decode};
use macaroon_pass::{
    ByteString, Format, HmacSha256Signer, Macaroon, MacaroonKey, Signer, Version,
};

#[derive(Clone, Debug)]
enum CaveatChoice {
    First(Vec<u8>),
    Third(Vec<u8>, Vec<u8>, String),
}

fn caveat_strategy() -> impl Strategy<Value = CaveatChoice> {
    prop_oneof![
        vec(any::<u8>(), 0..48).prop_map(CaveatChoice::First),
        (vec(any::<u8>(), 1..48), vec(any::<u8>(), 1..80), "[a-z./:]{1,24}")
            .prop_map(|(id, vid, loc)| CaveatChoice::Third(id, vid, loc)),
    ]
}

fn build_v2(id: Vec<u8>, location: Option<String>, caveats: Vec<CaveatChoice>, sig: Vec<u8>) -> Macaroon {
    let mut macaroon = Macaroon::new(ByteString(id), location, Version::V2).unwrap();
    for caveat in caveats {
        match caveat {
            CaveatChoice::First(cid) => {
                macaroon.append_first_party_caveat(ByteString(cid)).unwrap()
            }
            CaveatChoice::Third(cid, vid, loc) => macaroon
                .append_third_party_caveat(ByteString(cid), ByteString(vid), &loc)
                .unwrap(),
        }
    }
    macaroon.set_signature(ByteString(sig));
    macaroon
}

proptest! {
    // Any well-formed V2 macaroon survives the binary codec byte-exact,
    // signature included.
    #[test]
    fn v2_binary_round_trip(
        id in vec(any::<u8>(), 1..64),
        location in option::of("[a-z:/.]{0,30}"),
        caveats in vec(caveat_strategy(), 0..6),
        sig in vec(any::<u8>(), 0..80),
    ) {
        let macaroon = build_v2(id, location, caveats, sig);
        let wire = macaroon.serialize(Format::V2).unwrap();
        let decoded = Macaroon::deserialize(&wire).unwrap();
        prop_assert_eq!(macaroon, decoded);
    }

    // The JSON codec round-trips the same tokens, including non-UTF-8
    // byte fields through the _64 variants.
    #[test]
    fn v2_json_round_trip(
        id in vec(any::<u8>(), 1..64),
        location in option::of("[a-z:/.]{0,30}"),
        caveats in vec(caveat_strategy(), 0..6),
        sig in vec(any::<u8>(), 0..80),
    ) {
        let macaroon = build_v2(id, location, caveats, sig);
        let wire = macaroon.serialize(Format::V2JSON).unwrap();
        let decoded = Macaroon::deserialize(&wire).unwrap();
        prop_assert_eq!(macaroon, decoded);
    }

    // V1 macaroons (UTF-8 ids) survive the packet codec, embedded spaces
    // and newlines included, because packets are length-prefixed.
    #[test]
    fn v1_round_trip(
        id in "[ -~]{1,40}",
        location in option::of("[ -~]{1,30}"),
        cids in vec("(?s).{0,40}", 0..5),
        sig in vec(any::<u8>(), 0..48),
    ) {
        let mut macaroon = Macaroon::new(id.as_str().into(), location, Version::V1).unwrap();
        for cid in cids {
            macaroon.append_first_party_caveat(cid.as_str().into()).unwrap();
        }
        macaroon.set_signature(ByteString(sig));
        let wire = serialization::v1::serialize(&macaroon).unwrap();
        let decoded = serialization::v1::deserialize(&wire).unwrap();
        prop_assert_eq!(macaroon, decoded);
    }

    // Every common base64 shape of the same bytes decodes identically.
    #[test]
    fn base64_all_variants_accepted(data in vec(any::<u8>(), 0..64)) {
        for encoded in [
            STANDARD.encode(&data),
            STANDARD_NO_PAD.encode(&data),
            URL_SAFE.encode(&data),
            URL_SAFE_NO_PAD.encode(&data),
        ] {
            prop_assert_eq!(&base64_decode(encoded.as_bytes()).unwrap(), &data);
        }
    }

    // Incremental signing after each append, one aggregate sign at the
    // end, and a from-scratch chain recomputation all agree.
    #[test]
    fn signature_stability(
        seed in vec(any::<u8>(), 1..32),
        id in vec(any::<u8>(), 1..32),
        cids in vec(vec(any::<u8>(), 0..32), 0..6),
    ) {
        let key = MacaroonKey::generate(&seed);

        let mut incremental = Macaroon::new(ByteString(id.clone()), None, Version::V2).unwrap();
        let mut signer = HmacSha256Signer::new(key);
        signer.sign(&mut incremental).unwrap();
        for cid in &cids {
            incremental.append_first_party_caveat(ByteString(cid.clone())).unwrap();
            signer.sign(&mut incremental).unwrap();
        }

        let mut aggregate = Macaroon::new(ByteString(id), None, Version::V2).unwrap();
        for cid in &cids {
            aggregate.append_first_party_caveat(ByteString(cid.clone())).unwrap();
        }
        HmacSha256Signer::new(key).sign(&mut aggregate).unwrap();

        prop_assert_eq!(incremental.signature(), aggregate.signature());
        let from_scratch: ByteString = HmacSha256Signer::chain(&key, &aggregate).into();
        prop_assert_eq!(aggregate.signature(), &from_scratch);
    }

    // Attenuation monotonicity: whatever the holder appends, re-signing
    // keeps the token valid under the original root key.
    #[test]
    fn attenuation_keeps_token_valid(
        seed in vec(any::<u8>(), 1..32),
        base_cids in vec(vec(any::<u8>(), 0..24), 0..4),
        extra in caveat_strategy(),
    ) {
        let key = MacaroonKey::generate(&seed);
        let mut macaroon = Macaroon::new("some id".into(), None, Version::V2).unwrap();
        for cid in base_cids {
            macaroon.append_first_party_caveat(ByteString(cid)).unwrap();
        }
        HmacSha256Signer::new(key).sign(&mut macaroon).unwrap();
        prop_assert!(HmacSha256Signer::verify_with_key(&key, &macaroon).is_ok());

        let mut continuation = HmacSha256Signer::for_macaroon(&macaroon).unwrap();
        match extra {
            CaveatChoice::First(cid) => {
                macaroon.append_first_party_caveat(ByteString(cid)).unwrap()
            }
            CaveatChoice::Third(cid, vid, loc) => macaroon
                .append_third_party_caveat(ByteString(cid), ByteString(vid), &loc)
                .unwrap(),
        }
        continuation.sign(&mut macaroon).unwrap();
        prop_assert!(HmacSha256Signer::verify_with_key(&key, &macaroon).is_ok());
    }
}
