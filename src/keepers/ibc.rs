// RELAY RECORDS
// Packet receipts and light-client heights, consulted by admission to drop
// relays that were already processed.

use super::{get_u64, key, set_u64};
use log::debug;
use tessera_ante::RelayTracker;
use tessera_types::msgs::Packet;
use tessera_types::store::KvStore;

const RECEIPT_PREFIX: &[u8] = b"ibc/receipt/";
const CLIENT_PREFIX: &[u8] = b"ibc/client/";

fn receipt_key(channel: &str, sequence: u64) -> Vec<u8> {
    key(&[RECEIPT_PREFIX, channel.as_bytes(), b"/", &sequence.to_be_bytes()])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IbcKeeper;

impl IbcKeeper {
    pub fn record_packet(&self, store: &mut dyn KvStore, packet: &Packet) {
        store.set(&receipt_key(&packet.destination_channel, packet.sequence), vec![1]);
        debug!(
            "Received packet {} on {}",
            packet.sequence, packet.destination_channel
        );
    }

    /// Raises the client's height; lower heights are ignored.
    pub fn update_client(&self, store: &mut dyn KvStore, client_id: &str, height: u64) {
        let client_key = key(&[CLIENT_PREFIX, client_id.as_bytes()]);
        if height > get_u64(store, &client_key) {
            set_u64(store, &client_key, height);
        }
    }
}

impl RelayTracker for IbcKeeper {
    fn packet_received(&self, store: &dyn KvStore, channel: &str, sequence: u64) -> bool {
        store.has(&receipt_key(channel, sequence))
    }

    fn client_height(&self, store: &dyn KvStore, client_id: &str) -> Option<u64> {
        let client_key = key(&[CLIENT_PREFIX, client_id.as_bytes()]);
        store.has(&client_key).then(|| get_u64(store, &client_key))
    }
}
