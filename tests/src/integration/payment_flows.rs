//! # Payment Flows
//!
//! Payments across a line of four nodes, A -> B -> C -> D:
//!
//! 1. **Happy path**: the secret travels back from D and every hop unlocks
//!    off-chain
//! 2. **Expiry**: the initiator never reveals, every lock expires and is
//!    removed hop by hop
//! 3. **On-chain unlock**: B never unlocks C, so C registers the secret
//!    on-chain before its incoming lock expires

#[cfg(test)]
mod tests {
    use crate::network::Network;
    use pcn_mediated_transfer::domain::PayerState;
    use pcn_mediated_transfer::test_utils::{
        canonical_identifier, ALICE_KEY, BOB_KEY, CHARLIE_KEY, DAVE_KEY,
    };
    use pcn_mediated_transfer::{
        Event, MediatedTransferApi, MediatedTransferError, StateChange, TransferTask,
    };
    use shared_types::{Secret, U256};

    const A: usize = 0;
    const B: usize = 1;
    const C: usize = 2;
    const D: usize = 3;

    fn network() -> Network {
        Network::line(&[ALICE_KEY, BOB_KEY, CHARLIE_KEY, DAVE_KEY])
    }

    fn secret() -> Secret {
        Secret::new([0x5a; 32])
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_four_node_payment_unlocks_every_hop() {
        let mut network = network();
        network.pay(10, secret()).await;

        assert!(network.rejected.is_empty(), "rejected: {:?}", network.rejected);
        assert!(network.is_idle());

        for (index, channel) in [(A, 1u64), (B, 2), (C, 3)] {
            let ledger = &network.node(index).ledger;
            assert_eq!(
                ledger.transferred_amount(U256::from(channel)),
                Some(U256::from(10)),
                "channel {channel}"
            );
            assert!(ledger.pending_locks(U256::from(channel)).is_empty());
        }

        assert_eq!(
            network.effect_tags(A),
            vec![
                "SendLockedTransfer",
                "SendSecretReveal",
                "SendBalanceProof",
                "PaymentSentSuccess",
                "UnlockSuccess",
            ]
        );
        assert_eq!(
            network.effect_tags(D),
            vec![
                "SendSecretRequest",
                "SendSecretReveal",
                "PaymentReceivedSuccess",
                "UnlockClaimSuccess",
            ]
        );
        for mediator in [B, C] {
            let tags = network.effect_tags(mediator);
            assert!(tags.contains(&"UnlockSuccess"));
            assert!(tags.contains(&"UnlockClaimSuccess"));
        }
    }

    #[tokio::test]
    async fn test_mediators_forward_the_initiator_lock() {
        let mut network = network();
        network.withhold(network.address(D), "SendSecretRequest");
        let secrethash = network.pay(10, secret()).await;

        let locks: Vec<_> = [(A, 1u64), (B, 2), (C, 3)]
            .iter()
            .map(|(index, channel)| network.node(*index).ledger.pending_locks(U256::from(*channel)))
            .collect();
        for pending in &locks {
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0], locks[0][0]);
            assert_eq!(pending[0].secrethash, secrethash);
        }

        match network.node(B).service.task(&secrethash) {
            Some(TransferTask::Mediator(state)) => {
                assert_eq!(state.transfers_pair().len(), 1);
                assert_eq!(state.transfers_pair()[0].payee_address(), network.address(C));
            }
            other => panic!("unexpected task {:?}", other),
        }
        assert_eq!(network.held_back.len(), 1);
    }

    // =============================================================================
    // EXPIRY
    // =============================================================================

    #[tokio::test]
    async fn test_unrevealed_payment_expires_on_every_hop() {
        let mut network = network();
        network.withhold(network.address(A), "SendSecretReveal");
        let secrethash = network.pay(10, secret()).await;
        assert_eq!(network.node(D).service.active_secrethashes(), vec![secrethash]);

        network.advance(100).await;

        assert!(network.is_idle());
        for (index, channel) in [(A, 1u64), (B, 2), (C, 3)] {
            let ledger = &network.node(index).ledger;
            assert!(ledger.pending_locks(U256::from(channel)).is_empty());
            assert_eq!(ledger.transferred_amount(U256::from(channel)), Some(U256::zero()));
        }

        let initiator = network.effect_tags(A);
        assert!(initiator.contains(&"SendLockExpired"));
        assert!(initiator.contains(&"PaymentSentFailed"));
        let target = network.effect_tags(D);
        assert_eq!(target.last(), Some(&"UnlockClaimFailed"));

        // Mediators settle both legs on the block itself, so the lock expired
        // messages from their payers arrive after the task is gone.
        assert_eq!(network.rejected.len(), 2);
        assert!(network
            .rejected
            .iter()
            .all(|r| r.state_change == "ReceiveLockExpired"
                && matches!(r.error, MediatedTransferError::InvalidStateChange(_))));
    }

    // =============================================================================
    // ON-CHAIN UNLOCK
    // =============================================================================

    #[tokio::test]
    async fn test_mediator_registers_secret_when_payer_stalls() {
        let mut network = network();
        network.withhold(network.address(B), "SendBalanceProof");
        let secrethash = network.pay(10, secret()).await;

        // Everyone but C is settled: B was paid by A and considers C paid.
        for index in [A, B, D] {
            assert!(network.node(index).service.task(&secrethash).is_none());
        }
        let charlie = network.address(C);

        network.advance(50).await;
        assert!(network
            .node(C)
            .dispatcher
            .dispatched()
            .iter()
            .any(|e| matches!(e, Event::ContractSendSecretReveal { expiration: 100, .. })));

        network
            .send(
                charlie,
                StateChange::ContractReceiveSecretReveal {
                    secrethash,
                    secret: secret(),
                    block_number: 51,
                },
            )
            .await;
        match network.node(C).service.task(&secrethash) {
            Some(TransferTask::Mediator(state)) => {
                assert_eq!(state.transfers_pair()[0].payer_state(), PayerState::WaitingUnlock);
            }
            other => panic!("unexpected task {:?}", other),
        }
        assert!(matches!(
            network.node(C).dispatcher.dispatched().last(),
            Some(Event::ContractSendChannelBatchUnlock { participant, .. })
                if *participant == network.address(B)
        ));

        network
            .send(
                charlie,
                StateChange::ContractReceiveChannelBatchUnlock {
                    canonical_identifier: canonical_identifier(2),
                    receiver: charlie,
                    sender: network.address(B),
                    unlocked_amount: U256::from(10),
                },
            )
            .await;
        assert!(network.is_idle());
        assert_eq!(network.effect_tags(C).last(), Some(&"UnlockClaimSuccess"));
        assert!(network.rejected.is_empty(), "rejected: {:?}", network.rejected);
    }
}
