mod helpers;

use helpers::{
    create_test_guardian_set, create_test_vaa, message_payload, test_emitter, token_transfer_payload, VAABuilder,
    TEST_GUARDIAN_KEYS, TEST_QUORUM,
};
use relay_core::derive;
use relay_core::payload::{
    denormalize_amount, normalize_amount, truncate_amount, BridgeMessage, MessengerMessage, TokenTransfer,
    TransferExtra,
};
use relay_core::{
    Address, HttpAttestationSource, ParseError, RelayConfig, RelayError, Secp256k1Signer, Signer, VAA,
};

#[test]
fn test_vaa_roundtrip_with_real_signatures() {
    let vaa = VAABuilder::default()
        .add_signatures_from_keys(&TEST_GUARDIAN_KEYS[..TEST_QUORUM])
        .build();

    let bytes = vaa.encode().unwrap();
    assert_eq!(bytes.len(), vaa.encoded_len());
    assert_eq!(VAA::decode(&bytes).unwrap(), vaa);
}

#[test]
fn test_vaa_header_layout() {
    let vaa = create_test_vaa();
    let bytes = vaa.encode().unwrap();

    assert_eq!(bytes[0], 1);
    assert_eq!(&bytes[1..5], &[0, 0, 0, 0]);
    assert_eq!(bytes[5], 13);

    let body = 6 + 13 * 66;
    assert_eq!(&bytes[body + 8..body + 10], &[0, 1]);
    assert_eq!(&bytes[body + 10..body + 42], test_emitter().as_bytes());
    assert_eq!(&bytes[body + 42..body + 50], &42u64.to_be_bytes());
}

#[test]
fn test_every_truncated_prefix_is_a_parse_error() {
    let bytes = create_test_vaa().encode().unwrap();
    let body_end = bytes.len() - create_test_vaa().payload.len();

    for len in 0..body_end {
        match VAA::decode(&bytes[..len]) {
            Err(ParseError::Truncated { available, .. }) => assert!(available < bytes.len()),
            other => panic!("prefix of {len} bytes decoded to {other:?}"),
        }
    }
}

#[test]
fn test_signature_count_over_255_is_rejected() {
    let mut vaa = create_test_vaa();
    let template = vaa.signatures[0].clone();
    vaa.signatures = (0..256).map(|i| {
        let mut sig = template.clone();
        sig.guardian_index = i as u8;
        sig
    }).collect();

    assert_eq!(vaa.encode(), Err(ParseError::TooManySignatures(256)));
}

#[test]
fn test_signatures_verify_against_guardian_set() {
    let guardian_set = create_test_guardian_set();
    assert_eq!(guardian_set.quorum(), TEST_QUORUM);

    let vaa = VAABuilder::default()
        .add_signatures_from_keys(&TEST_GUARDIAN_KEYS[..TEST_QUORUM])
        .build();
    vaa.verify_signatures(&guardian_set).unwrap();

    let short = VAABuilder::default()
        .add_signatures_from_keys(&TEST_GUARDIAN_KEYS[..TEST_QUORUM - 1])
        .build();
    assert!(matches!(short.verify_signatures(&guardian_set), Err(RelayError::Signing(_))));
}

#[test]
fn test_tampered_body_fails_verification() {
    let guardian_set = create_test_guardian_set();
    let mut vaa = VAABuilder::default()
        .add_signatures_from_keys(&TEST_GUARDIAN_KEYS[..TEST_QUORUM])
        .build();
    vaa.sequence += 1;

    assert!(vaa.verify_signatures(&guardian_set).is_err());
}

#[test]
fn test_digest_is_double_keccak_of_body() {
    let vaa = create_test_vaa();
    assert_eq!(vaa.message_hash(), relay_core::utils::keccak256(&vaa.body()));
    assert_eq!(vaa.digest(), relay_core::utils::keccak256(&vaa.message_hash()));
}

#[test]
fn test_signer_address_matches_guardian_key() {
    let signer = Secp256k1Signer::new(TEST_GUARDIAN_KEYS[0]).unwrap();
    assert_eq!(
        hex::encode(signer.get_address()),
        "90f8bf6a479f320ead074411a4b0e7944ea8c9c1"
    );
    assert_eq!(signer.address(), Address::from_native(&signer.get_address()));
}

#[test]
fn test_token_transfer_with_payload_decodes() {
    let recipient = Address([0x77; 32]);
    let transfer = TokenTransfer::decode(&token_transfer_payload(1_000, 2, recipient)).unwrap();

    assert_eq!(transfer.payload_type(), 3);
    assert_eq!(transfer.amount.to_u64(), Some(1_000));
    assert_eq!(transfer.recipient_chain, 2);
    match &transfer.extra {
        TransferExtra::WithPayload { sender, payload } => {
            assert_eq!(*sender, test_emitter());
            assert_eq!(BridgeMessage::decode(payload).unwrap(), BridgeMessage::Hello { recipient });
        }
        other => panic!("unexpected extra {other:?}"),
    }
}

#[test]
fn test_token_transfer_rejects_unknown_type_and_trailing_bytes() {
    let mut payload = token_transfer_payload(1, 2, Address([1; 32]));
    payload[0] = 2;
    assert_eq!(TokenTransfer::decode(&payload), Err(ParseError::UnknownPayloadType(2)));

    let mut fee_transfer = vec![1u8];
    fee_transfer.extend_from_slice(&[0u8; 32 + 32 + 2 + 32 + 2 + 32]);
    assert!(TokenTransfer::decode(&fee_transfer).is_ok());
    fee_transfer.push(0);
    assert_eq!(TokenTransfer::decode(&fee_transfer), Err(ParseError::TrailingBytes(1)));
}

#[test]
fn test_messenger_payload_limits() {
    assert_eq!(
        MessengerMessage::decode(&message_payload("hello")).unwrap(),
        MessengerMessage::Message { payload: b"hello".to_vec() }
    );
    assert_eq!(
        MessengerMessage::Message { payload: vec![0; 1025] }.encode(),
        Err(ParseError::PayloadTooLarge(1025))
    );
}

#[test]
fn test_amount_normalization() {
    assert_eq!(normalize_amount(1_500_000_000, 9), 150_000_000);
    assert_eq!(denormalize_amount(150_000_000, 9), 1_500_000_000);
    assert_eq!(normalize_amount(1_000, 6), 1_000);
    assert_eq!(truncate_amount(1_234_567_891, 9), 1_234_567_890);
    assert_eq!(truncate_amount(9, 9), 0);
}

#[test]
fn test_derivation_is_deterministic() {
    let program = Address::from_base58("Scaffo1dingHe11oWor1dMessengerProgram111111").unwrap();

    let first = derive::derive(&program, &[b"emitter".as_slice()]).unwrap();
    let second = derive::derive(&program, &[b"emitter".as_slice()]).unwrap();
    assert_eq!(first, second);
    assert_eq!(derive::emitter_address(&program).unwrap(), first);
    assert_ne!(derive::config_address(&program).unwrap(), first);

    assert_ne!(
        derive::received_address(&program, 2, 42).unwrap(),
        derive::received_address(&program, 30, 42).unwrap()
    );
}

#[test]
fn test_seed_limits() {
    let program = Address([3; 32]);
    let long = [0u8; 33];
    assert!(matches!(
        derive::derive(&program, &[long.as_slice()]),
        Err(relay_core::DeriveError::InvalidSeed { index: 0, len: 33 })
    ));
}

#[test]
fn test_lookup_path_for_sequence_42() {
    let path = HttpAttestationSource::lookup_path(1, &test_emitter(), 42);
    assert_eq!(path, format!("/v1/signed_vaa/1/{}01/42", "0".repeat(62)));
}

#[test]
fn test_default_config_values() {
    let config = RelayConfig::default_test_config();
    assert_eq!(config.attestation.poll_interval_secs, 5);
    assert_eq!(config.attestation.deadline_secs, 180);
    assert_eq!(config.transactions.default_gas_limit, 300_000);
}
