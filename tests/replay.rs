//! Independent nodes executing the same transactions agree byte for byte.

mod common;

use common::*;
use tessera_square::DataAvailabilityHeader;
use tessera_types::appconsts::BOND_DENOM;
use tessera_types::version::ProtocolVersion;

fn blocks(network: &mut Network) -> Vec<Vec<Vec<u8>>> {
    let (u1, u2) = (network.users[1].address, network.users[2].address);
    let u0 = network.users[0].address;
    let block1 = vec![network.users[0].send(&u1, 1_000), network.users[1].send(&u0, 500)];
    let block2 = vec![
        network.users[0].blob(b"rollup", vec![7u8; 1_200], ProtocolVersion::V2),
        network.users[1].send(&u2, 10),
    ];
    let block3 = vec![network.users[2].send(&u0, 7)];
    vec![block1, block2, block3]
}

#[test_log::test]
fn test_three_block_replay_is_deterministic() {
    let mut network = Network::new(3, 1);
    let txs = blocks(&mut network);

    let mut first = new_app(&network, ProtocolVersion::V2, config());
    let mut second = new_app(&network, ProtocolVersion::V2, config());
    assert_eq!(first.state_hash(), second.state_hash());

    for block in &txs {
        let (prepared_a, hash_a) = run_block(&mut first, block);
        let (prepared_b, hash_b) = run_block(&mut second, block);
        assert_eq!(prepared_a, prepared_b);
        assert_eq!(prepared_a.txs.len(), block.len());
        assert_eq!(hash_a, hash_b);
    }

    assert_eq!(first.last_height(), 3);
    let u0 = network.users[0].address;
    assert_eq!(first.balance(&u0, BOND_DENOM), INITIAL_BALANCE - 1_000 - FEE + 500 - FEE + 7);
    assert_eq!(first.account(&u0).unwrap().sequence, 2);
    assert_eq!(first.export_genesis().unwrap(), second.export_genesis().unwrap());
}

#[test]
fn test_empty_block_has_minimal_square() {
    let network = Network::new(1, 1);
    let mut app = new_app(&network, ProtocolVersion::V1, config());
    let (prepared, _) = run_block(&mut app, &[]);
    assert!(prepared.txs.is_empty());
    assert_eq!(prepared.square_size, 1);
    assert_eq!(prepared.data_root, DataAvailabilityHeader::min().unwrap().hash());
}

#[test]
fn test_blob_square_grows_with_content() {
    let mut network = Network::new(1, 1);
    let mut app = new_app(&network, ProtocolVersion::V2, config());
    let blob = network.users[0].blob(b"rollup", vec![1u8; 20_000], ProtocolVersion::V2);
    let (prepared, _) = run_block(&mut app, &[blob]);
    assert_eq!(prepared.txs.len(), 1);
    assert!(prepared.square_size >= 8);
    assert!(prepared.square_size.is_power_of_two());
}
