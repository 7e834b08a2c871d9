use gitup_hash::ObjectId;
use proptest::prelude::*;

proptest! {
    #[test]
    fn hex_roundtrip(bytes in proptest::array::uniform20(any::<u8>())) {
        let oid = ObjectId::from(bytes);
        let hex = oid.to_hex();
        prop_assert_eq!(hex.len(), 40);
        prop_assert!(hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        let parsed = ObjectId::from_hex(&hex).unwrap();
        prop_assert_eq!(parsed, oid);
    }

    #[test]
    fn case_does_not_change_identity(bytes in proptest::array::uniform20(any::<u8>())) {
        let hex = ObjectId::from(bytes).to_hex();
        let upper = ObjectId::from_hex(&hex.to_uppercase()).unwrap();
        prop_assert_eq!(upper, ObjectId::from(bytes));
    }

    #[test]
    fn rejects_non_hex(s in "[g-z]{40}") {
        prop_assert!(ObjectId::from_hex(&s).is_err());
    }

    #[test]
    fn rejects_wrong_length(s in "[0-9a-f]{0,39}") {
        prop_assert!(ObjectId::from_hex(&s).is_err());
    }
}
