mod helpers;

use helpers::{
    create_test_guardian_set, test_emitter, MockChain, VAABuilder, TEST_GUARDIAN_KEYS, TEST_QUORUM,
};
use relay_core::api::router;
use relay_core::{
    Address, AttestationPoller, AttestationStore, ChainAdapter, DestinationChainAdapter, HttpAttestationSource,
    Relay, RelayError, RelayState, TransferIntent,
};
use serial_test::serial;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Binds the lookup API on an ephemeral port and returns its base URL.
async fn spawn_api(store: AttestationStore) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(store)).await.unwrap();
    });
    format!("http://{address}")
}

/// Signs everything `chain` publishes into `store`, the way a guardian network would.
fn spawn_guardians(chain: MockChain, store: AttestationStore, emitter: Address) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            for message in chain.get_published().await {
                if store.get_vaa_bytes(chain.chain_id(), &emitter, message.sequence).await.is_some() {
                    continue;
                }
                let vaa = VAABuilder::new(chain.chain_id(), emitter, message.sequence)
                    .with_payload(message.payload)
                    .add_signatures_from_keys(&TEST_GUARDIAN_KEYS[..TEST_QUORUM])
                    .build();
                store.store_vaa(&vaa).await.unwrap();
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
}

fn http_poller(base_url: &str, deadline: Duration) -> Arc<AttestationPoller> {
    let source = Arc::new(HttpAttestationSource::new(base_url));
    Arc::new(AttestationPoller::new(source, Duration::from_millis(50), deadline))
}

#[tokio::test]
#[serial]
async fn test_e2e_wait_and_redeem_sequence_42() {
    let store = AttestationStore::new();
    let vaa = VAABuilder::new(1, test_emitter(), 42)
        .add_signatures_from_keys(&TEST_GUARDIAN_KEYS[..TEST_QUORUM])
        .build();
    store.store_vaa(&vaa).await.unwrap();
    let base_url = spawn_api(store).await;

    let poller = http_poller(&base_url, Duration::from_secs(5));
    let fetched = poller.await_attestation(1, &test_emitter(), 42).await.unwrap();
    assert_eq!(fetched, vaa);
    fetched.verify_signatures(&create_test_guardian_set()).unwrap();

    let destination = MockChain::new(2, Address([0x22; 32]));
    destination.redeem(&fetched).await.unwrap();
    assert!(destination.is_redeemed(&fetched).await.unwrap());
    assert!(matches!(destination.redeem(&fetched).await, Err(RelayError::AlreadyRedeemed)));
    assert_eq!(destination.redeem_submissions().await, 1);
}

#[tokio::test]
#[serial]
async fn test_e2e_message_relay_over_http() {
    let store = AttestationStore::new();
    let base_url = spawn_api(store.clone()).await;

    let source = MockChain::new(1, test_emitter());
    source.set_next_sequence(42).await;
    let destination = MockChain::new(2, Address([0x22; 32]));
    let guardians = spawn_guardians(source.clone(), store.clone(), test_emitter());

    let mut relay = Relay::new(
        Arc::new(source.clone()),
        Arc::new(destination.clone()),
        http_poller(&base_url, Duration::from_secs(5)),
    );
    let receipt = relay
        .run(&TransferIntent::Message {
            payload: b"hello over http".to_vec(),
        })
        .await
        .unwrap();
    guardians.abort();

    assert_eq!(receipt.sequence, 42);
    assert!(receipt.redeem_tx.is_some());
    assert!(matches!(relay.state(), RelayState::Redeemed { sequence: 42, tx: Some(_) }));
    assert_eq!(store.len().await, 1);
    assert!(destination.is_redeemed(&receipt.vaa).await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_e2e_token_relay_over_http() {
    let store = AttestationStore::new();
    let base_url = spawn_api(store.clone()).await;

    let source = MockChain::new(1, test_emitter());
    let destination = MockChain::new(2, Address([0x22; 32]));
    let guardians = spawn_guardians(source.clone(), store.clone(), test_emitter());

    let mut relay = Relay::new(
        Arc::new(source.clone()),
        Arc::new(destination.clone()),
        http_poller(&base_url, Duration::from_secs(5)),
    );
    let receipt = relay
        .run(&TransferIntent::Tokens {
            token: Address([0x55; 32]),
            amount: 1_000,
            recipient_chain: 2,
            recipient: Address([0x77; 32]),
            batch_id: 0,
        })
        .await
        .unwrap();
    guardians.abort();

    assert_eq!(receipt.sequence, 0);
    assert_eq!(receipt.vaa.payload[0], 3);
    assert_eq!(destination.redeem_submissions().await, 1);
}

#[tokio::test]
#[serial]
async fn test_e2e_concurrent_relays_share_adapters() {
    let store = AttestationStore::new();
    let base_url = spawn_api(store.clone()).await;

    let source = MockChain::new(1, test_emitter());
    source.set_next_sequence(100).await;
    let destination = MockChain::new(2, Address([0x22; 32]));
    let guardians = spawn_guardians(source.clone(), store.clone(), test_emitter());

    let source_arc = Arc::new(source.clone());
    let destination_arc = Arc::new(destination.clone());
    let poller = http_poller(&base_url, Duration::from_secs(5));

    let mut handles = Vec::new();
    for i in 0..4u8 {
        let mut relay = Relay::new(source_arc.clone(), destination_arc.clone(), poller.clone());
        handles.push(tokio::spawn(async move {
            relay
                .run(&TransferIntent::Message { payload: vec![i; 8] })
                .await
        }));
    }

    let mut sequences = Vec::new();
    for handle in handles {
        let receipt = handle.await.unwrap().unwrap();
        assert!(receipt.redeem_tx.is_some());
        sequences.push(receipt.sequence);
    }
    guardians.abort();

    sequences.sort_unstable();
    assert_eq!(sequences, vec![100, 101, 102, 103]);
    assert_eq!(destination.redeem_submissions().await, 4);
    assert_eq!(source.get_published().await.len(), 4);
}

#[tokio::test]
#[serial]
async fn test_e2e_timeout_then_resume_after_attestation_arrives() {
    let store = AttestationStore::new();
    let base_url = spawn_api(store.clone()).await;

    let source = MockChain::new(1, test_emitter());
    source.set_next_sequence(7).await;
    let destination = MockChain::new(2, Address([0x22; 32]));

    let mut relay = Relay::new(
        Arc::new(source.clone()),
        Arc::new(destination.clone()),
        http_poller(&base_url, Duration::from_millis(300)),
    );
    let err = relay
        .run(&TransferIntent::Message {
            payload: b"late".to_vec(),
        })
        .await
        .unwrap_err();
    match &err {
        RelayError::Timeout { chain, sequence, .. } => {
            assert_eq!(*chain, 1);
            assert_eq!(*sequence, 7);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(err.is_recoverable());

    let guardians = spawn_guardians(source.clone(), store.clone(), test_emitter());
    let mut resumed = Relay::new(
        Arc::new(source.clone()),
        Arc::new(destination.clone()),
        http_poller(&base_url, Duration::from_secs(5)),
    );
    let receipt = resumed.resume(7).await.unwrap();
    guardians.abort();

    assert_eq!(receipt.sequence, 7);
    assert!(receipt.source_tx.is_none());
    assert_eq!(destination.redeem_submissions().await, 1);
}

#[tokio::test]
#[serial]
async fn test_e2e_unresponsive_service_still_times_out_on_deadline() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            held.push(socket);
        }
    });

    let deadline = Duration::from_secs(1);
    let interval = Duration::from_millis(500);
    let source = Arc::new(HttpAttestationSource::new(format!("http://{address}")));
    let poller = AttestationPoller::new(source, interval, deadline);

    let started = tokio::time::Instant::now();
    let result = poller.await_attestation(1, &test_emitter(), 42).await;
    let elapsed = started.elapsed();
    server.abort();

    assert!(matches!(result, Err(RelayError::Timeout { sequence: 42, .. })));
    assert!(elapsed >= deadline);
    assert!(elapsed < deadline + interval);
}
