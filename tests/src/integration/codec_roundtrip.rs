//! # Codec Round Trips
//!
//! Task states captured mid-payment are encoded as tagged records and
//! decoded back, by type and through the registry.

#[cfg(test)]
mod tests {
    use crate::network::Network;
    use pcn_mediated_transfer::codec::{decode_from_str, encode_to_string, TYPE_FIELD, VERSION_FIELD};
    use pcn_mediated_transfer::test_utils::{
        address, address_of, make_mediation_pair, ALICE_KEY, BOB_KEY, CHARLIE_KEY,
    };
    use pcn_mediated_transfer::{
        decode, decode_any, encode, AnyRecord, CodecError, MediatedTransferApi,
        MediationPairState, MediatorTransferState, TargetTransferState, TransferTask,
    };
    use serde_json::json;
    use shared_types::{Secret, SecretHash, ValidationError};

    /// A -> B -> C payment waiting for the initiator's secret reveal.
    async fn stalled_network() -> (Network, SecretHash) {
        let mut network = Network::line(&[ALICE_KEY, BOB_KEY, CHARLIE_KEY]);
        network.withhold(network.address(0), "SendSecretReveal");
        let secrethash = network.pay(10, Secret::new([0x77; 32])).await;
        (network, secrethash)
    }

    #[tokio::test]
    async fn test_live_task_states_round_trip() {
        let (network, secrethash) = stalled_network().await;

        for index in 0..3 {
            let task = network.node(index).service.task(&secrethash).unwrap();
            let (value, decoded) = match &task {
                TransferTask::Initiator(state) => {
                    let value = encode(state).unwrap();
                    let decoded = decode(value.clone()).map(TransferTask::Initiator).unwrap();
                    (value, decoded)
                }
                TransferTask::Mediator(state) => {
                    let value = encode(state).unwrap();
                    let decoded = decode(value.clone()).map(TransferTask::Mediator).unwrap();
                    (value, decoded)
                }
                TransferTask::Target(state) => {
                    let value = encode(state).unwrap();
                    let decoded = decode(value.clone()).map(TransferTask::Target).unwrap();
                    (value, decoded)
                }
            };
            assert_eq!(decoded, task);
            assert_eq!(value[VERSION_FIELD], json!(1));

            let any = decode_any(value.clone()).unwrap();
            assert_eq!(json!(any.type_tag()), value[TYPE_FIELD]);
        }
    }

    #[tokio::test]
    async fn test_mediator_state_survives_string_round_trip() {
        let (network, secrethash) = stalled_network().await;
        let Some(TransferTask::Mediator(state)) = network.node(1).service.task(&secrethash) else {
            panic!("B mediates");
        };

        let text = encode_to_string(&state).unwrap();
        let back: MediatorTransferState = decode_from_str(&text).unwrap();
        assert_eq!(back, state);
        assert!(matches!(
            decode_any(serde_json::from_str(&text).unwrap()).unwrap(),
            AnyRecord::MediatorTransfer(_)
        ));
    }

    #[test]
    fn test_wrong_record_type_rejected() {
        let pair = make_mediation_pair(SecretHash::new([4; 32]));
        let value = encode(&pair).unwrap();
        assert!(matches!(
            decode::<TargetTransferState>(value),
            Err(CodecError::TagMismatch { .. })
        ));
    }

    #[test]
    fn test_decoded_pair_revalidates_payee_address() {
        let pair = make_mediation_pair(SecretHash::new([4; 32]));
        let mut value = encode(&pair).unwrap();
        assert_eq!(value["payee_address"], json!(address(5).to_string()));

        value["payee_address"] = json!("0x1234");
        assert!(decode::<MediationPairState>(value.clone()).is_err());

        value["payee_address"] = json!(address_of(ALICE_KEY).to_string());
        assert!(matches!(
            decode::<MediationPairState>(value),
            Err(CodecError::Invalid(ValidationError::InvalidField {
                field: "payee_address",
                ..
            }))
        ));
    }
}
