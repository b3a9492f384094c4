//! # Construction and Ordering Scenarios
//!
//! A transfer built from a description, a payee that tries to get paid
//! before its payer, and a mediator that runs out of routes.

#[cfg(test)]
mod tests {
    use pcn_mediated_transfer::algorithms::{mediator, TransitionContext};
    use pcn_mediated_transfer::domain::{PayeeState, PayerState};
    use pcn_mediated_transfer::test_utils::{
        address, address_of, keypair, ledger_with_channels, make_description_params,
        make_mediation_pair, make_signed_transfer, seeded_rng, token_address, ALICE_KEY, BOB_KEY,
    };
    use pcn_mediated_transfer::{
        compute_locksroot, secrethash_of, BalanceProof, BalanceProofUnsignedState, ChannelLedger,
        Event, HashTimeLock, LockedTransferUnsignedState, MediatedTransferConfig,
        MediatedTransferError, RouteState, StateChange, TransferDescriptionWithSecretState,
        TransitionError,
    };
    use shared_types::{
        CanonicalIdentifier, Locksroot, Secret, SecretHash, ValidationError, EMPTY_LOCKSROOT, U256,
    };

    // =========================================================================
    // SCENARIO A: DESCRIPTION TO LOCKED TRANSFER
    // =========================================================================

    #[test]
    fn test_locked_transfer_from_description() {
        let secret = Secret::new([0x21; 32]);
        let description =
            TransferDescriptionWithSecretState::new(make_description_params(Some(secret.clone())))
                .unwrap();
        let secrethash = secrethash_of(&secret);
        assert_eq!(description.secrethash(), secrethash);

        let lock = HashTimeLock::new(description.amount(), 100, secrethash);
        let locksroot = compute_locksroot(&[lock.lockhash()]);
        assert_eq!(locksroot, Locksroot::new(lock.lockhash()));

        let balance_proof = BalanceProofUnsignedState::new(
            1,
            U256::zero(),
            lock.amount,
            locksroot,
            CanonicalIdentifier::new(1, description.token_network_identifier(), U256::from(1)),
        )
        .unwrap();
        let transfer = LockedTransferUnsignedState::new(
            description.payment_identifier(),
            token_address(),
            balance_proof,
            lock.clone(),
            description.initiator(),
            description.target(),
        )
        .unwrap();

        assert_eq!(transfer.lock(), &lock);
        assert_eq!(*transfer.balance_proof().locksroot(), locksroot);
    }

    #[test]
    fn test_locked_transfer_with_empty_locksroot_fails() {
        let lock = HashTimeLock::new(U256::from(10), 100, SecretHash::new([3; 32]));
        let result = BalanceProofUnsignedState::new(
            1,
            U256::zero(),
            lock.amount,
            EMPTY_LOCKSROOT,
            CanonicalIdentifier::new(1, address(8), U256::from(1)),
        );
        assert_eq!(result.unwrap_err(), ValidationError::EmptyLocksroot);
    }

    // =========================================================================
    // SCENARIO B: PAYEE AHEAD OF PAYER
    // =========================================================================

    #[test]
    fn test_payee_cannot_be_paid_while_payer_pending() {
        let mut pair = make_mediation_pair(SecretHash::new([9; 32]));
        assert_eq!(pair.payer_state(), PayerState::Pending);

        let err = pair.set_payee_state(PayeeState::BalanceProof).unwrap_err();
        assert!(matches!(err, TransitionError::PayeeAheadOfPayer { .. }));
        assert_eq!(pair.payee_state(), PayeeState::Pending);

        pair.set_payer_state(PayerState::SecretRevealed).unwrap();
        pair.set_payee_state(PayeeState::BalanceProof).unwrap();
        assert_eq!(pair.payee_state(), PayeeState::BalanceProof);
    }

    // =========================================================================
    // SCENARIO C: MEDIATOR OUT OF ROUTES
    // =========================================================================

    #[test]
    fn test_refund_with_exhausted_routes_and_expired_payer() {
        let config = MediatedTransferConfig::default();
        let bob = address_of(BOB_KEY);
        let ledger = ledger_with_channels(&[(bob, 2)]);
        let ctx = TransitionContext {
            our_address: address(3),
            block_number: 10,
            config: &config,
            channels: &ledger,
        };
        let mut rng = seeded_rng();

        let secrethash = secrethash_of(&Secret::new([0x31; 32]));
        let init = StateChange::ActionInitMediator {
            from_route: RouteState::new(address_of(ALICE_KEY), U256::from(1)),
            from_transfer: make_signed_transfer(&keypair(ALICE_KEY), secrethash, 10, 100, 1),
            routes: vec![RouteState::new(bob, U256::from(2))],
        };
        let result = mediator::state_transition(None, &init, &ctx, &mut rng).unwrap();
        for event in &result.events {
            ledger.record(event).unwrap();
        }
        let Some(Event::SendLockedTransfer { transfer, .. }) = result.events.first() else {
            panic!("expected the transfer to be forwarded");
        };
        let refund = transfer.sign(5, &keypair(BOB_KEY)).unwrap();
        assert_eq!(refund.balance_proof().channel_identifier(), U256::from(2));

        let mut state = result.new_state.unwrap();
        state.transfers_pair_mut()[0]
            .set_payer_state(PayerState::Expired)
            .unwrap();
        assert!(state.available_routes(&address_of(ALICE_KEY)).is_empty());

        let change = StateChange::ReceiveTransferRefund {
            transfer: refund,
            routes: Vec::new(),
        };
        let err = mediator::state_transition(Some(state.clone()), &change, &ctx, &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            MediatedTransferError::RoutesExhausted { secrethash: h } if h == secrethash
        ));
        assert_eq!(state.transfers_pair().len(), 1);
    }
}
