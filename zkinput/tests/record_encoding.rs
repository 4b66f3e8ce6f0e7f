use proptest::prelude::*;
use serde_json::{json, Value};
use zkinput::{
    codec::{adjust_length, encode_input_record, FixedWidthCodec, TruncationPolicy},
    error::{CodecError, EncodeError},
    fields::{FieldSpec, SourceKind, FIELD_TABLE},
};

fn sample_record() -> Value {
    json!({
        "id": "7f3a",
        "user": "alice",
        "game": "chess",
        "character": "knight",
        "ability": "fork",
        "place": "e4",
        "place2": "f7",
        "uploader": "0x3D4206092FEF5AdDdb20B1f2392D2a2BB3FBe894",
        "timestamp": "2024-01-01T00:00:00Z",
        "hash_inputdata": [222, 173, 190, 239],
        "notes": { "free": "form" }
    })
}

#[test]
fn every_field_has_its_declared_width() {
    let record = encode_input_record(&sample_record(), FIELD_TABLE).unwrap();
    for spec in FIELD_TABLE {
        let field = record.field(spec.name).unwrap();
        assert_eq!(field.bytes.len(), spec.target_len, "{}", spec.name);
        let encoded = record.payload()[spec.name].as_array().unwrap();
        assert_eq!(encoded.len(), spec.target_len, "{}", spec.name);
    }
    assert_eq!(record.truncated_fields().count(), 0);
}

#[test]
fn encoded_values() {
    let record = encode_input_record(&sample_record(), FIELD_TABLE).unwrap();
    let payload = record.to_json();

    assert_eq!(payload["user"], json!([97, 108, 105, 99, 101, 0, 0, 0]));
    assert_eq!(payload["timestamp"], json!([0, 0, 0, 0, 101, 146, 0, 128]));
    assert_eq!(
        payload["uploader"],
        json!([
            0x3d, 0x42, 0x06, 0x09, 0x2f, 0xef, 0x5a, 0xdd, 0xdb, 0x20, 0xb1, 0xf2, 0x39, 0x2d,
            0x2a, 0x2b, 0xb3, 0xfb, 0xe8, 0x94
        ])
    );
    let mut hash = vec![222, 173, 190, 239];
    hash.resize(32, 0);
    assert_eq!(payload["hash_inputdata"], json!(hash));
}

#[test]
fn unknown_keys_pass_through_in_place() {
    let record = encode_input_record(&sample_record(), FIELD_TABLE).unwrap();
    let keys: Vec<&str> = record.payload().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "id",
            "user",
            "game",
            "character",
            "ability",
            "place",
            "place2",
            "uploader",
            "timestamp",
            "hash_inputdata",
            "notes"
        ]
    );
    assert_eq!(record.payload()["id"], "7f3a");
    assert_eq!(record.payload()["notes"], json!({ "free": "form" }));
}

#[test]
fn missing_field_is_named() {
    let mut raw = sample_record();
    raw.as_object_mut().unwrap().remove("hash_inputdata");
    let err = encode_input_record(&raw, FIELD_TABLE).unwrap_err();
    assert_eq!(err, CodecError::MissingField("hash_inputdata".into()));
    assert_eq!(err.field(), Some("hash_inputdata"));
}

#[test]
fn first_failure_aborts_with_field_name() {
    let mut raw = sample_record();
    raw["game"] = json!(42);
    raw["uploader"] = json!("0xABC");
    let err = encode_input_record(&raw, FIELD_TABLE).unwrap_err();
    assert_eq!(
        err,
        CodecError::Field {
            field: "game".into(),
            source: EncodeError::TypeMismatch {
                expected: SourceKind::AsciiString,
                found: "number",
            },
        }
    );
    assert!(err.to_string().contains("game"));
}

#[test]
fn truncation_is_reported_or_rejected() {
    let mut raw = sample_record();
    raw["user"] = json!("a-very-long-name");

    let record = FixedWidthCodec::default().encode_record(&raw).unwrap();
    let user = record.field("user").unwrap();
    assert_eq!(user.bytes, b"a-very-l".to_vec());
    assert_eq!(user.original_len, 16);
    let truncated: Vec<&str> = record.truncated_fields().map(|f| f.name.as_str()).collect();
    assert_eq!(truncated, vec!["user"]);

    let err = FixedWidthCodec::default()
        .with_truncation_policy(TruncationPolicy::Strict)
        .encode_record(&raw)
        .unwrap_err();
    assert_eq!(
        err,
        CodecError::Field {
            field: "user".into(),
            source: EncodeError::LengthExceeded { len: 16, target: 8 },
        }
    );
}

#[test]
fn raw_buffer_fields_are_idempotent() {
    const BUFFERS: &[FieldSpec] = &[
        FieldSpec::new("hash_inputdata", SourceKind::RawByteBuffer, 32),
        FieldSpec::new("extra", SourceKind::RawByteBuffer, 4),
    ];
    let raw = json!({ "hash_inputdata": [1, 2, 3], "extra": [9, 9, 9, 9, 9, 9] });

    let once = encode_input_record(&raw, BUFFERS).unwrap();
    let twice = encode_input_record(&once.to_json(), BUFFERS).unwrap();
    assert_eq!(once.payload(), twice.payload());
    assert_eq!(twice.truncated_fields().count(), 0);
}

#[test]
fn encoded_record_serializes_as_payload() {
    let record = encode_input_record(&sample_record(), FIELD_TABLE).unwrap();
    let text = serde_json::to_string(&record).unwrap();
    let back: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(back, record.to_json());
}

proptest! {
    #[test]
    fn adjusted_length_is_target(seq in prop::collection::vec(any::<u8>(), 0..64), n in 0usize..64) {
        prop_assert_eq!(adjust_length(seq, n).len(), n);
    }

    #[test]
    fn short_sequences_are_zero_padded(seq in prop::collection::vec(any::<u8>(), 0..32), extra in 0usize..32) {
        let n = seq.len() + extra;
        let adjusted = adjust_length(seq.clone(), n);
        prop_assert_eq!(&adjusted[..seq.len()], &seq[..]);
        prop_assert!(adjusted[seq.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn long_sequences_keep_prefix(seq in prop::collection::vec(any::<u8>(), 1..64), cut in 0usize..64) {
        let n = cut % seq.len();
        prop_assert_eq!(adjust_length(seq.clone(), n), seq[..n].to_vec());
    }

    #[test]
    fn adjust_length_is_idempotent(seq in prop::collection::vec(any::<u8>(), 0..64), n in 0usize..64) {
        let once = adjust_length(seq, n);
        prop_assert_eq!(adjust_length(once.clone(), n), once);
    }
}
