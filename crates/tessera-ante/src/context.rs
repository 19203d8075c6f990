use crate::gas::GasMeter;
use tessera_types::coin::DecCoin;
use tessera_types::store::KvStore;
use tessera_types::version::ProtocolVersion;

/// Why a transaction is being admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecMode {
    /// First admission into the local mempool
    Check,
    /// Re-admission of a mempool transaction after a block commits
    ReCheck,
    /// Filtering candidates while building a proposal
    Prepare,
    /// Replaying a received proposal
    Process,
    /// Executing a committed block
    Deliver,
    /// Gas estimation; signatures are not verified
    Simulate,
}

impl ExecMode {
    pub fn is_check(self) -> bool {
        matches!(self, ExecMode::Check | ExecMode::ReCheck)
    }
}

/// Ambient state for admitting one transaction.
pub struct AnteContext<'a> {
    pub store: &'a mut dyn KvStore,
    pub chain_id: &'a str,
    pub height: u64,
    pub version: ProtocolVersion,
    pub mode: ExecMode,
    /// Node-local gas price floor (mempool only)
    pub min_gas_prices: &'a [DecCoin],
    /// Encoded size of the transaction as received
    pub tx_size: u64,
    pub gas_meter: GasMeter,
    pub priority: u64,
}

impl<'a> AnteContext<'a> {
    pub fn new(
        store: &'a mut dyn KvStore,
        chain_id: &'a str,
        height: u64,
        version: ProtocolVersion,
        mode: ExecMode,
        tx_size: u64,
    ) -> Self {
        AnteContext {
            store,
            chain_id,
            height,
            version,
            mode,
            min_gas_prices: &[],
            tx_size,
            gas_meter: GasMeter::infinite(),
            priority: 0,
        }
    }

    pub fn with_min_gas_prices(mut self, prices: &'a [DecCoin]) -> Self {
        self.min_gas_prices = prices;
        self
    }
}
