//! Prepare and process agree for arbitrary mixes of transfers and blobs.

mod common;

use common::*;
use proptest::prelude::*;
use tessera::{ProcessProposal, ProposalStatus};
use tessera_types::address::Address;
use tessera_types::version::ProtocolVersion;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_prepared_proposals_validate_everywhere(
        sends in prop::collection::vec((0usize..3, 1u64..1_000), 0..8),
        blobs in prop::collection::vec((0usize..3, 1usize..4_000), 0..4),
    ) {
        let mut network = Network::new(3, 1);
        let app_a = new_app(&network, ProtocolVersion::V2, config());
        let app_b = new_app(&network, ProtocolVersion::V2, config());

        let mut txs = Vec::new();
        for (sender, amount) in &sends {
            let to = network.users[(sender + 1) % 3].address;
            txs.push(network.users[*sender].send(&to, *amount));
        }
        for (sender, len) in &blobs {
            txs.push(network.users[*sender].blob(b"prop", vec![*len as u8; *len], ProtocolVersion::V2));
        }

        let prepared_a = app_a.prepare_proposal(&txs, u64::MAX, 1).unwrap();
        let prepared_b = app_b.prepare_proposal(&txs, u64::MAX, 1).unwrap();
        prop_assert_eq!(&prepared_a, &prepared_b);

        let status = app_b.process_proposal(&ProcessProposal {
            height: 1,
            proposer: Address::default(),
            txs: prepared_a.txs.clone(),
            square_size: prepared_a.square_size,
            data_root: prepared_a.data_root,
        });
        prop_assert_eq!(status, ProposalStatus::Accept);
    }
}
