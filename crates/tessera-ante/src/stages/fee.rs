// FEES & PRIORITY
// A fee must cover `ceil(min_gas_price × gas_limit)` for the node-local floor
// (mempool admission only) and, from the version that introduced it, for the
// network-wide floor as well. Priority orders the mempool by gas price.
//
// SAFETY INVARIANTS:
// 1. Fee thresholds round up
// 2. The network floor applies in every mode except simulation
// 3. The fee is taken from the granter when one is named, else the payer

use crate::context::{AnteContext, ExecMode};
use crate::error::AnteError;
use crate::handler::AnteStage;
use crate::keepers::{FeeExecutor, ParamsProvider};
use log::debug;
use std::sync::Arc;
use tessera_types::appconsts::{self, PRIORITY_SCALING_FACTOR};
use tessera_types::coin::{amount_of, format_coins, Coin, DecCoin};
use tessera_types::error::TxError;
use tessera_types::tx::Tx;

/// Checks `fee` against `prices`. Passes if the fee covers the requirement
/// in any one of the priced denominations.
pub fn check_fee(fee: &[Coin], gas_limit: u64, prices: &[DecCoin], threshold: &'static str) -> Result<(), AnteError> {
    let required: Vec<Coin> = prices
        .iter()
        .filter(|p| !p.is_zero())
        .map(|p| Coin::new(p.required_fee(gas_limit), p.denom.clone()))
        .collect();
    if required.is_empty() {
        return Ok(());
    }
    if required.iter().any(|r| amount_of(fee, &r.denom) >= r.amount) {
        return Ok(());
    }
    Err(AnteError::InsufficientFee {
        threshold,
        required: format_coins(&required),
        provided: format_coins(fee),
    })
}

/// Lowest gas price across the fee's denominations, scaled to an integer.
pub fn tx_priority(fee: &[Coin], gas_limit: u64) -> u64 {
    if gas_limit == 0 {
        return 0;
    }
    fee.iter()
        .map(|c| c.amount as u128 * PRIORITY_SCALING_FACTOR / gas_limit as u128)
        .min()
        .map(|p| u64::try_from(p).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

pub struct DeductFee {
    fees: Arc<dyn FeeExecutor>,
    params: Arc<dyn ParamsProvider>,
}

impl DeductFee {
    pub fn new(fees: Arc<dyn FeeExecutor>, params: Arc<dyn ParamsProvider>) -> Self {
        DeductFee { fees, params }
    }
}

impl AnteStage for DeductFee {
    fn name(&self) -> &'static str {
        "deduct_fee"
    }

    fn check(&self, ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<(), AnteError> {
        let fee = &tx.fee().amount;
        let gas_limit = tx.fee().gas_limit;

        if ctx.mode.is_check() {
            check_fee(fee, gas_limit, ctx.min_gas_prices, "local")?;
        }
        if ctx.mode != ExecMode::Simulate && ctx.version >= appconsts::NETWORK_MIN_GAS_PRICE_FROM {
            let network = self.params.ante_params(&*ctx.store).network_min_gas_price_coin();
            check_fee(fee, gas_limit, &[network], "network")?;
        }
        ctx.priority = tx_priority(fee, gas_limit);

        if fee.iter().all(|c| c.amount == 0) {
            return Ok(());
        }
        let payer = tx.fee_payer().ok_or(AnteError::InvalidTx(TxError::NoSigners))?;
        let charged = match tx.fee().granter {
            Some(granter) if granter != payer => {
                self.fees
                    .use_grant(&mut *ctx.store, &granter, &payer, fee, &tx.body.messages)?;
                granter
            }
            _ => payer,
        };
        self.fees.deduct_fee(&mut *ctx.store, &charged, fee)?;
        debug!("Deducted fee {} from {}", format_coins(fee), charged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(s: &str) -> Vec<DecCoin> {
        tessera_types::coin::parse_dec_coins(s).unwrap()
    }

    #[test]
    fn test_fee_boundary() {
        // 0.002 × 100_001 = 200.002, rounded up to 201.
        let prices = price("0.002utsr");
        assert!(check_fee(&[Coin::new(201, "utsr")], 100_001, &prices, "local").is_ok());
        assert!(matches!(
            check_fee(&[Coin::new(200, "utsr")], 100_001, &prices, "local"),
            Err(AnteError::InsufficientFee { threshold: "local", .. })
        ));
    }

    #[test]
    fn test_any_denom_suffices() {
        let prices = price("0.002utsr,1stake");
        assert!(check_fee(&[Coin::new(1000, "stake")], 1000, &prices, "local").is_ok());
        assert!(check_fee(&[Coin::new(999, "stake")], 1000, &prices, "local").is_err());
        assert!(check_fee(&[], 1000, &[], "local").is_ok());
    }

    #[test]
    fn test_priority_is_min_gas_price() {
        let fee = vec![Coin::new(2000, "utsr"), Coin::new(500, "stake")];
        assert_eq!(tx_priority(&fee, 1_000_000), 500);
        assert_eq!(tx_priority(&[], 1_000_000), 0);
    }
}
