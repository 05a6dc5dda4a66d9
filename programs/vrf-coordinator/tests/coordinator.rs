//! End-to-end behavior of a coordinator over in-memory collaborators:
//! request, fulfill, pay, and the ledger operations around them.

mod common;

use std::collections::HashSet;

use common::*;
use vrf_coordinator::proof::{expand_randomness, output_of, prove};
use vrf_coordinator::{
    CoordinatorError, CoordinatorEvent, ErrorKind, ExtraArgsV1, RequestCommitment, TokenLedger,
};

#[test]
fn request_ids_are_unique_per_nonce() {
    let h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    assert_eq!(h.coordinator.consumer_nonce(&consumer.id, sub_id), 1);

    let mut ids = HashSet::new();
    for expected_nonce in 2..=6 {
        let e = h.request(consumer.id, sub_id, 1, false);
        assert!(ids.insert(e.request_id));
        assert_eq!(h.coordinator.consumer_nonce(&consumer.id, sub_id), expected_nonce);
    }
}

#[test]
fn fulfillment_pays_oracle_and_delivers_words() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);

    let e = h.request(consumer.id, sub_id, 3, false);
    assert!(h.coordinator.commitment_of(&e.request_id).is_some());

    let outcome = h.fulfill(&e).unwrap();
    assert!(outcome.success);
    assert!(!outcome.native_payment);
    assert!(outcome.payment > 0);

    let sub = h.coordinator.get_subscription(sub_id).unwrap();
    assert_eq!(sub.balance, 10 * ONE_LINK - outcome.payment);
    assert_eq!(sub.req_count, 1);
    assert_eq!(h.coordinator.withdrawable_tokens(&h.oracle), outcome.payment);
    assert_eq!(h.coordinator.commitment_of(&e.request_id), None);

    let fulfilled = consumer.fulfilled.lock();
    assert_eq!(fulfilled.len(), 1);
    assert_eq!(fulfilled[0].0, e.request_id);
    assert_eq!(fulfilled[0].1.len(), 3);

    let last = h.coordinator.events_since(0).pop().unwrap();
    match last.event {
        CoordinatorEvent::RandomWordsFulfilled(f) => {
            assert_eq!(f.request_id, e.request_id);
            assert_eq!(f.payment, outcome.payment);
            assert!(f.success);
        }
        other => panic!("unexpected event {}", other.name()),
    }
}

#[test]
fn second_fulfillment_finds_no_request() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    let e = h.request(consumer.id, sub_id, 1, false);

    h.fulfill(&e).unwrap();
    assert_eq!(h.fulfill(&e), Err(CoordinatorError::NoCorrespondingRequest));
    assert_eq!(consumer.fulfilled.lock().len(), 1);
}

#[test]
fn any_tampered_commitment_field_is_rejected() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    let e = h.request(consumer.id, sub_id, 2, false);
    h.advance(3);

    let proof = h.proof(&e);
    let rc = h.commitment(&e);
    let tampered = [
        RequestCommitment { block_number: rc.block_number - 1, ..rc },
        RequestCommitment { sub_id: rc.sub_id + 1, ..rc },
        RequestCommitment { callback_gas_limit: rc.callback_gas_limit + 1, ..rc },
        RequestCommitment { num_words: rc.num_words + 1, ..rc },
        RequestCommitment { sender: pk(99), ..rc },
        RequestCommitment { native_payment: !rc.native_payment, ..rc },
    ];
    for bad in tampered {
        assert_eq!(h.submit(&proof, &bad), Err(CoordinatorError::IncorrectCommitment));
    }
    assert!(h.submit(&proof, &rc).is_ok());
}

#[test]
fn pending_request_tracks_request_and_fulfillment() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    assert!(!h.coordinator.pending_request_exists(sub_id));

    let e = h.request(consumer.id, sub_id, 1, false);
    assert!(h.coordinator.pending_request_exists(sub_id));

    h.fulfill(&e).unwrap();
    assert!(!h.coordinator.pending_request_exists(sub_id));
}

#[test]
fn pending_check_only_sees_latest_nonce() {
    // A consumer with two requests in flight: once the newer one is
    // fulfilled the older one is no longer detected, although it is still
    // outstanding and fulfillable.
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);

    let older = h.request(consumer.id, sub_id, 1, false);
    let newer = h.request(consumer.id, sub_id, 1, false);
    h.fulfill(&newer).unwrap();

    assert!(h.coordinator.commitment_of(&older.request_id).is_some());
    assert!(!h.coordinator.pending_request_exists(sub_id));
    assert!(h.fulfill(&older).is_ok());
}

#[test]
fn request_confirmations_are_bounded() {
    let h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], ONE_LINK, 0);

    let mut req = h.request_params(sub_id, 1, false);
    req.request_confirmations = 2;
    assert_eq!(
        h.coordinator.request_random_words(&mut h.tx(consumer.id), req.clone()),
        Err(CoordinatorError::InvalidRequestConfirmations { have: 2, min: 3, max: 200 })
    );
    req.request_confirmations = 201;
    assert!(matches!(
        h.coordinator.request_random_words(&mut h.tx(consumer.id), req.clone()),
        Err(CoordinatorError::InvalidRequestConfirmations { have: 201, .. })
    ));
    req.request_confirmations = 3;
    assert!(h.coordinator.request_random_words(&mut h.tx(consumer.id), req).is_ok());
}

#[test]
fn num_words_limit_and_expansion() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);

    let req = h.request_params(sub_id, 501, false);
    assert_eq!(
        h.coordinator.request_random_words(&mut h.tx(consumer.id), req),
        Err(CoordinatorError::NumWordsTooBig { have: 501, want: 500 })
    );

    let e = h.request(consumer.id, sub_id, 500, false);
    h.advance(3);
    let proof = h.proof(&e);
    h.submit(&proof, &h.commitment(&e)).unwrap();

    let fulfilled = consumer.fulfilled.lock();
    let words = &fulfilled[0].1;
    assert_eq!(words.len(), 500);
    assert_eq!(*words, expand_randomness(&output_of(&proof), 500));
}

#[test]
fn request_validation_failures() {
    let h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], ONE_LINK, 0);

    let req = h.request_params(sub_id + 7, 1, false);
    assert_eq!(
        h.coordinator.request_random_words(&mut h.tx(consumer.id), req),
        Err(CoordinatorError::InvalidSubscription)
    );

    let req = h.request_params(sub_id, 1, false);
    assert_eq!(
        h.coordinator.request_random_words(&mut h.tx(pk(11)), req),
        Err(CoordinatorError::InvalidConsumer { sub_id, consumer: pk(11) })
    );

    let mut req = h.request_params(sub_id, 1, false);
    req.callback_gas_limit = 500_001;
    assert_eq!(
        h.coordinator.request_random_words(&mut h.tx(consumer.id), req),
        Err(CoordinatorError::GasLimitTooBig { have: 500_001, want: 500_000 })
    );

    let mut req = h.request_params(sub_id, 1, false);
    req.extra_args = vec![0xde, 0xad, 0xbe, 0xef, 1];
    assert_eq!(
        h.coordinator.request_random_words(&mut h.tx(consumer.id), req),
        Err(CoordinatorError::InvalidExtraArgsTag)
    );

    // Nothing above touched the nonce.
    assert_eq!(h.coordinator.consumer_nonce(&consumer.id, sub_id), 1);
}

#[test]
fn unregistered_key_hash_is_accepted_but_never_fulfillable() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], ONE_LINK, 0);

    let mut req = h.request_params(sub_id, 1, false);
    req.callback_gas_limit = 0;
    req.key_hash = [5u8; 32];
    let request_id = h.coordinator.request_random_words(&mut h.tx(consumer.id), req).unwrap();
    let e = h.requested(&request_id);
    h.advance(3);

    let rogue = ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]);
    let proof = prove(&rogue, &e.pre_seed, &h.block_hash(e.block_number));
    assert!(matches!(
        h.submit(&proof, &h.commitment(&e)),
        Err(CoordinatorError::NoSuchProvingKey(_))
    ));
}

#[test]
fn native_payment_debits_native_balance() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], ONE_LINK, ONE_NATIVE);

    let e = h.request(consumer.id, sub_id, 1, true);
    assert!(e.native_payment);
    let outcome = h.fulfill(&e).unwrap();
    assert!(outcome.native_payment);

    let sub = h.coordinator.get_subscription(sub_id).unwrap();
    assert_eq!(sub.native_balance, ONE_NATIVE - outcome.payment);
    assert_eq!(sub.balance, ONE_LINK);
    assert_eq!(h.coordinator.withdrawable_native(&h.oracle), outcome.payment);
    assert_eq!(h.coordinator.withdrawable_tokens(&h.oracle), 0);
}

#[test]
fn payment_follows_chain_data_fee() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], ONE_LINK, ONE_NATIVE);

    let first = h.request(consumer.id, sub_id, 1, true);
    let base = h.fulfill(&first).unwrap().payment;

    h.world.chain_cost.set(777);
    let second = h.request(consumer.id, sub_id, 1, true);
    let with_fee = h.fulfill(&second).unwrap().payment;
    assert_eq!(with_fee, base + 777);
}

#[test]
fn failing_callbacks_still_settle() {
    for behavior in [Behavior::Revert, Behavior::Panic, Behavior::BurnGas] {
        let mut h = Harness::new();
        let consumer = h.deploy_consumer(pk(10));
        consumer.behave(behavior);
        let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);

        let e = h.request(consumer.id, sub_id, 1, false);
        let outcome = h.fulfill(&e).unwrap();
        assert!(!outcome.success, "{behavior:?}");
        assert!(outcome.payment > 0);
        assert_eq!(h.coordinator.commitment_of(&e.request_id), None);
        assert_eq!(h.coordinator.withdrawable_tokens(&h.oracle), outcome.payment);
        assert!(consumer.fulfilled.lock().is_empty());
    }
}

#[test]
fn consumer_without_code_gets_failed_callback() {
    let mut h = Harness::new();
    let sub_id = h.subscribe(&[pk(10)], 10 * ONE_LINK, 0);
    let e = h.request(pk(10), sub_id, 1, false);
    let outcome = h.fulfill(&e).unwrap();
    assert!(!outcome.success);
}

#[test]
fn underfunded_fulfillment_transaction_is_rejected() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    let e = h.request(consumer.id, sub_id, 1, false);
    h.advance(3);

    let mut tx = vrf_coordinator::TxContext::new(h.oracle, h.head(), 0, GAS_PRICE, 250_000);
    let err = h
        .coordinator
        .fulfill_random_words(&mut tx, &h.proof(&e), &h.commitment(&e))
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::InsufficientGasForConsumer { .. }));
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(h.coordinator.commitment_of(&e.request_id).is_some());
    assert!(consumer.fulfilled.lock().is_empty());
}

#[test]
fn callback_cannot_reenter_guarded_operations() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    consumer.behave(Behavior::Reenter { sub_id });

    let e = h.request(consumer.id, sub_id, 1, false);
    let outcome = h.fulfill(&e).unwrap();
    assert!(outcome.success);
    assert_eq!(*consumer.nested_errors.lock(), vec![CoordinatorError::Reentrant]);
    assert_eq!(h.coordinator.consumer_nonce(&consumer.id, sub_id), 2);

    // The guard is released afterwards.
    consumer.behave(Behavior::Accept);
    assert!(h.request(consumer.id, sub_id, 1, false).request_id != e.request_id);
}

#[test]
fn short_balance_undoes_fulfillment_and_callback_effects() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    consumer.behave(Behavior::OpenSubscription);
    let sub_id = h.subscribe(&[consumer.id], 1_000, 0);

    let e = h.request(consumer.id, sub_id, 1, false);
    let events_before = h.coordinator.events_since(0).len();

    assert_eq!(h.fulfill(&e), Err(CoordinatorError::InsufficientBalance));

    assert!(h.coordinator.commitment_of(&e.request_id).is_some());
    assert!(h.coordinator.pending_request_exists(sub_id));
    assert_eq!(h.coordinator.get_subscription(sub_id).unwrap().balance, 1_000);
    assert_eq!(h.coordinator.withdrawable_tokens(&h.oracle), 0);
    // The subscription the callback opened is gone with the rest.
    assert_eq!(h.coordinator.get_subscription(sub_id + 1), Err(CoordinatorError::InvalidSubscription));
    assert_eq!(h.coordinator.events_since(0).len(), events_before);
}

#[test]
fn block_hash_resolution() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    let e = h.request(consumer.id, sub_id, 1, false);
    let proof = h.proof(&e);
    let rc = h.commitment(&e);

    // Same block: the hash is not live yet and nothing is stored.
    let err = h.submit(&proof, &rc).unwrap_err();
    assert_eq!(err, CoordinatorError::BlockhashNotInStore(e.block_number));
    assert!(err.is_retryable());

    // Past the live window the historical store must have it.
    h.advance(300);
    assert_eq!(
        h.submit(&proof, &rc),
        Err(CoordinatorError::BlockhashNotInStore(e.block_number))
    );
    h.world
        .blockhash_store
        .store(e.block_number, h.block_hash(e.block_number));
    assert!(h.submit(&proof, &rc).is_ok());
}

#[test]
fn proof_for_wrong_block_fails_verification() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    let e = h.request(consumer.id, sub_id, 1, false);
    h.advance(3);

    let proof = prove(&h.oracle_key, &e.pre_seed, &[0xab; 32]);
    let err = h.submit(&proof, &h.commitment(&e)).unwrap_err();
    assert!(matches!(err, CoordinatorError::ProofVerificationFailed(_)));
    assert_eq!(err.kind(), ErrorKind::Verification);
    assert!(!err.is_retryable());
    assert!(h.coordinator.commitment_of(&e.request_id).is_some());
}

#[test]
fn bad_link_price_aborts_fulfillment() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    let e = h.request(consumer.id, sub_id, 1, false);

    h.world.price_feed.set(vrf_coordinator::RoundData { answer: 0, updated_at: 0 });
    let err = h.fulfill(&e).unwrap_err();
    assert_eq!(err, CoordinatorError::InvalidLinkWeiPrice(0));
    assert!(err.is_retryable());
    assert!(h.coordinator.commitment_of(&e.request_id).is_some());
    assert_eq!(h.coordinator.withdrawable_tokens(&h.oracle), 0);
    // The consumer already saw the words; only the ledger is rolled back.
    assert_eq!(consumer.fulfilled.lock().len(), 1);

    h.world.price_feed.set(vrf_coordinator::RoundData { answer: LINK_PRICE, updated_at: 0 });
    assert!(h.fulfill(&e).is_ok());
    assert_eq!(consumer.fulfilled.lock().len(), 2);
}

#[test]
fn consumer_removal() {
    let mut h = Harness::new();
    let a = h.deploy_consumer(pk(10));
    let b = h.deploy_consumer(pk(11));
    let c = h.deploy_consumer(pk(12));
    let sub_id = h.subscribe(&[a.id, b.id, c.id], 10 * ONE_LINK, 0);

    let e = h.request(b.id, sub_id, 1, false);
    assert_eq!(
        h.coordinator.remove_consumer(&mut h.tx(h.sub_owner), sub_id, a.id),
        Err(CoordinatorError::PendingRequestExists)
    );
    h.fulfill(&e).unwrap();

    assert_eq!(
        h.coordinator.remove_consumer(&mut h.tx(pk(50)), sub_id, a.id),
        Err(CoordinatorError::MustBeSubOwner(h.sub_owner))
    );
    h.coordinator.remove_consumer(&mut h.tx(h.sub_owner), sub_id, a.id).unwrap();
    assert_eq!(h.coordinator.consumer_nonce(&a.id, sub_id), 0);

    let consumers = h.coordinator.get_subscription(sub_id).unwrap().consumers;
    assert_eq!(as_set(&consumers), as_set(&[b.id, c.id]));

    assert_eq!(
        h.coordinator.remove_consumer(&mut h.tx(h.sub_owner), sub_id, a.id),
        Err(CoordinatorError::InvalidConsumer { sub_id, consumer: a.id })
    );
}

#[test]
fn adding_consumers() {
    let h = Harness::new();
    let sub_id = h.subscribe(&[], 0, 0);
    let c = &h.coordinator;

    c.add_consumer(&mut h.tx(h.sub_owner), sub_id, pk(10)).unwrap();
    c.add_consumer(&mut h.tx(h.sub_owner), sub_id, pk(10)).unwrap();
    assert_eq!(c.get_subscription(sub_id).unwrap().consumers, vec![pk(10)]);

    for i in 1..100u32 {
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&i.to_le_bytes());
        bytes[31] = 1;
        c.add_consumer(&mut h.tx(h.sub_owner), sub_id, vrf_coordinator::Pubkey::new_from_array(bytes))
            .unwrap();
    }
    assert_eq!(
        c.add_consumer(&mut h.tx(h.sub_owner), sub_id, pk(11)),
        Err(CoordinatorError::TooManyConsumers)
    );
}

#[test]
fn cancel_refunds_and_respects_pending_requests() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, ONE_NATIVE);
    let recipient = pk(60);

    let e = h.request(consumer.id, sub_id, 1, false);
    assert_eq!(
        h.coordinator.cancel_subscription(&mut h.tx(h.sub_owner), sub_id, recipient),
        Err(CoordinatorError::PendingRequestExists)
    );
    let paid = h.fulfill(&e).unwrap().payment;

    h.coordinator
        .cancel_subscription(&mut h.tx(h.sub_owner), sub_id, recipient)
        .unwrap();
    assert_eq!(h.world.link.balance_of(&recipient), 10 * ONE_LINK - paid);
    assert_eq!(h.world.native.balance_of(&recipient), ONE_NATIVE);
    assert_eq!(h.coordinator.get_subscription(sub_id), Err(CoordinatorError::InvalidSubscription));
    assert_eq!(h.coordinator.consumer_nonce(&consumer.id, sub_id), 0);
    assert_eq!(h.coordinator.total_balances(), (paid, 0));
}

#[test]
fn owner_cancel_ignores_pending_requests() {
    let h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    h.request(consumer.id, sub_id, 1, false);

    assert_eq!(
        h.coordinator.owner_cancel_subscription(&mut h.tx(h.sub_owner), sub_id),
        Err(CoordinatorError::OnlyCallableByOwner)
    );
    h.coordinator
        .owner_cancel_subscription(&mut h.tx(h.owner), sub_id)
        .unwrap();
    assert_eq!(h.world.link.balance_of(&h.sub_owner), 10 * ONE_LINK);
}

#[test]
fn cancel_pays_out_both_balances_or_neither() {
    let h = Harness::new();
    let sub_id = h.subscribe(&[], 2 * ONE_LINK, 2 * ONE_NATIVE);
    let recipient = pk(60);
    // Native holdings fall short of what the ledger owes.
    h.world
        .native
        .transfer(&h.coordinator.id(), &pk(50), ONE_NATIVE)
        .unwrap();

    let err = h
        .coordinator
        .cancel_subscription(&mut h.tx(h.sub_owner), sub_id, recipient)
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::TransferFailed(_)));
    assert_eq!(h.world.link.balance_of(&recipient), 0);
    assert_eq!(h.world.native.balance_of(&recipient), 0);
    assert_eq!(h.world.link.balance_of(&h.coordinator.id()), 2 * ONE_LINK);
    assert_eq!(h.coordinator.total_balances(), (2 * ONE_LINK, 2 * ONE_NATIVE));
    assert!(h.coordinator.get_subscription(sub_id).is_ok());
    assert!(!h.event_names().contains(&"SubscriptionCanceled"));
}

#[test]
fn oracle_withdraws_earnings() {
    let mut h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], 10 * ONE_LINK, 0);
    let e = h.request(consumer.id, sub_id, 1, false);
    let paid = h.fulfill(&e).unwrap().payment;

    let payee = pk(70);
    let oracle = h.oracle;
    assert_eq!(h.coordinator.withdraw(&mut h.tx(oracle), payee), Ok(paid));
    assert_eq!(h.world.link.balance_of(&payee), paid);
    assert_eq!(h.coordinator.withdrawable_tokens(&oracle), 0);
    assert_eq!(
        h.coordinator.withdraw(&mut h.tx(oracle), payee),
        Err(CoordinatorError::InsufficientBalance)
    );
    assert_eq!(
        h.coordinator.withdraw_native(&mut h.tx(oracle), payee),
        Err(CoordinatorError::InsufficientBalance)
    );
}

#[test]
fn ledger_totals_match_holdings() {
    let mut h = Harness::new();
    let a = h.deploy_consumer(pk(10));
    let b = h.deploy_consumer(pk(11));
    let s1 = h.subscribe(&[a.id], 10 * ONE_LINK, ONE_NATIVE);
    let s2 = h.subscribe(&[b.id], 5 * ONE_LINK, ONE_NATIVE);

    let e1 = h.request(a.id, s1, 2, false);
    let e2 = h.request(b.id, s2, 2, true);
    h.fulfill(&e1).unwrap();
    h.fulfill(&e2).unwrap();

    let held = h.held(&[s1, s2], &[h.oracle]);
    assert_eq!(h.coordinator.total_balances(), held);
    assert_eq!(held, (15 * ONE_LINK, 2 * ONE_NATIVE));
    assert_eq!(h.world.link.balance_of(&h.coordinator.id()), 15 * ONE_LINK);
}

#[test]
fn subscription_owner_transfer_is_two_step() {
    let h = Harness::new();
    let sub_id = h.subscribe(&[], 0, 0);
    let new_owner = pk(80);

    h.coordinator
        .request_subscription_owner_transfer(&mut h.tx(h.sub_owner), sub_id, new_owner)
        .unwrap();
    assert_eq!(
        h.coordinator.accept_subscription_owner_transfer(&mut h.tx(pk(81)), sub_id),
        Err(CoordinatorError::MustBeRequestedOwner(new_owner))
    );
    h.coordinator
        .accept_subscription_owner_transfer(&mut h.tx(new_owner), sub_id)
        .unwrap();

    let sub = h.coordinator.get_subscription(sub_id).unwrap();
    assert_eq!(sub.owner, new_owner);
    assert_eq!(sub.requested_owner, None);
    assert_eq!(
        h.coordinator.add_consumer(&mut h.tx(h.sub_owner), sub_id, pk(10)),
        Err(CoordinatorError::MustBeSubOwner(new_owner))
    );
}

#[test]
fn administration_is_owner_only_and_validated() {
    let h = Harness::new();
    let c = &h.coordinator;

    assert_eq!(c.set_config(&mut h.tx(pk(50)), test_config()), Err(CoordinatorError::OnlyCallableByOwner));
    let too_many = vrf_coordinator::CoordinatorConfig {
        minimum_request_confirmations: 201,
        ..test_config()
    };
    assert!(matches!(
        c.set_config(&mut h.tx(h.owner), too_many),
        Err(CoordinatorError::InvalidRequestConfirmations { have: 201, .. })
    ));
    let no_price = vrf_coordinator::CoordinatorConfig {
        fallback_wei_per_unit_link: 0,
        ..test_config()
    };
    assert_eq!(
        c.set_config(&mut h.tx(h.owner), no_price),
        Err(CoordinatorError::InvalidLinkWeiPrice(0))
    );
    assert_eq!(c.get_config(), test_config());

    let public_key = h.oracle_key.verifying_key().to_bytes();
    assert_eq!(
        c.register_proving_key(&mut h.tx(h.owner), h.oracle, public_key),
        Err(CoordinatorError::ProvingKeyAlreadyRegistered(h.key_hash))
    );
    c.deregister_proving_key(&mut h.tx(h.owner), public_key).unwrap();
    assert!(c.proving_key_hashes().is_empty());
    assert_eq!(
        c.deregister_proving_key(&mut h.tx(h.owner), public_key),
        Err(CoordinatorError::NoSuchProvingKey(h.key_hash))
    );

    c.register_migratable_coordinator(&mut h.tx(h.owner), pk(101)).unwrap();
    assert_eq!(
        c.register_migratable_coordinator(&mut h.tx(h.owner), pk(101)),
        Err(CoordinatorError::CoordinatorAlreadyRegistered(pk(101)))
    );
    c.deregister_migratable_coordinator(&mut h.tx(h.owner), pk(101)).unwrap();
    assert_eq!(
        c.deregister_migratable_coordinator(&mut h.tx(h.owner), pk(101)),
        Err(CoordinatorError::CoordinatorNotRegistered(pk(101)))
    );
}

#[test]
fn failed_operations_publish_nothing() {
    let h = Harness::new();
    let before = h.event_names();
    let _ = h.coordinator.set_config(&mut h.tx(pk(50)), test_config());
    let _ = h.coordinator.add_consumer(&mut h.tx(h.sub_owner), 42, pk(10));
    assert_eq!(h.event_names(), before);
    assert_eq!(&before[..2], &["ConfigSet", "ProvingKeyRegistered"]);
}

#[test]
fn concurrent_requests_are_serialized() {
    let h = Harness::new();
    let consumers: Vec<_> = (10..14).map(|n| h.deploy_consumer(pk(n))).collect();
    let ids: Vec<_> = consumers.iter().map(|c| c.id).collect();
    let sub_id = h.subscribe(&ids, 10 * ONE_LINK, 0);

    std::thread::scope(|s| {
        for consumer in &ids {
            let h = &h;
            s.spawn(move || {
                for _ in 0..10 {
                    let req = h.request_params(sub_id, 1, false);
                    h.coordinator.request_random_words(&mut h.tx(*consumer), req).unwrap();
                }
            });
        }
    });

    let mut request_ids = HashSet::new();
    for logged in h.coordinator.events_since(0) {
        if let CoordinatorEvent::RandomWordsRequested(e) = logged.event {
            assert!(request_ids.insert(e.request_id));
        }
    }
    assert_eq!(request_ids.len(), 40);
    for consumer in &ids {
        assert_eq!(h.coordinator.consumer_nonce(consumer, sub_id), 11);
    }
}

#[test]
fn explicit_fee_token_extra_args() {
    let h = Harness::new();
    let consumer = h.deploy_consumer(pk(10));
    let sub_id = h.subscribe(&[consumer.id], ONE_LINK, 0);
    let mut req = h.request_params(sub_id, 1, false);
    req.extra_args = ExtraArgsV1 { native_payment: false }.encode();
    let id = h.coordinator.request_random_words(&mut h.tx(consumer.id), req).unwrap();
    assert!(!h.requested(&id).native_payment);
}
