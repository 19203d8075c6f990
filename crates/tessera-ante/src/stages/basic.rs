use crate::context::{AnteContext, ExecMode};
use crate::error::AnteError;
use crate::gas::GasMeter;
use crate::handler::AnteStage;
use crate::keepers::ParamsProvider;
use std::sync::Arc;
use tessera_types::appconsts;
use tessera_types::tx::Tx;

/// Bounds all later gas consumption by the fee's gas limit.
pub struct SetUpGasMeter;

impl AnteStage for SetUpGasMeter {
    fn name(&self) -> &'static str {
        "set_up_gas_meter"
    }

    fn check(&self, ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<(), AnteError> {
        ctx.gas_meter = if ctx.mode == ExecMode::Simulate {
            GasMeter::infinite()
        } else {
            GasMeter::new(tx.fee().gas_limit)
        };
        Ok(())
    }
}

/// Rejects oversized transactions from the version that introduced the limit.
pub struct MaxTxSize;

impl AnteStage for MaxTxSize {
    fn name(&self) -> &'static str {
        "max_tx_size"
    }

    fn check(&self, ctx: &mut AnteContext<'_>, _tx: &Tx) -> Result<(), AnteError> {
        if ctx.version < appconsts::MAX_TX_SIZE_FROM {
            return Ok(());
        }
        let max = appconsts::max_tx_size(ctx.version);
        if ctx.tx_size > max {
            return Err(AnteError::TxTooLarge {
                size: ctx.tx_size,
                max,
            });
        }
        Ok(())
    }
}

/// Extension options, stateless validity, timeout height and memo length.
pub struct StructuralChecks {
    params: Arc<dyn ParamsProvider>,
}

impl StructuralChecks {
    pub fn new(params: Arc<dyn ParamsProvider>) -> Self {
        StructuralChecks { params }
    }
}

impl AnteStage for StructuralChecks {
    fn name(&self) -> &'static str {
        "structural_checks"
    }

    fn check(&self, ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<(), AnteError> {
        if !tx.body.extension_options.is_empty() {
            return Err(AnteError::ExtensionOptionsNotAllowed);
        }

        tx.validate_basic()?;

        let timeout = tx.body.timeout_height;
        if timeout > 0 && ctx.height > timeout {
            return Err(AnteError::TxTimeout {
                timeout,
                height: ctx.height,
            });
        }

        let max = self.params.ante_params(&*ctx.store).max_memo_characters;
        let len = tx.body.memo.chars().count() as u64;
        if len > max {
            return Err(AnteError::MemoTooLong { len, max });
        }
        Ok(())
    }
}

/// Charges gas per byte of the encoded transaction.
pub struct ConsumeTxSizeGas {
    params: Arc<dyn ParamsProvider>,
}

impl ConsumeTxSizeGas {
    pub fn new(params: Arc<dyn ParamsProvider>) -> Self {
        ConsumeTxSizeGas { params }
    }
}

impl AnteStage for ConsumeTxSizeGas {
    fn name(&self) -> &'static str {
        "consume_tx_size_gas"
    }

    fn check(&self, ctx: &mut AnteContext<'_>, _tx: &Tx) -> Result<(), AnteError> {
        let cost = self.params.ante_params(&*ctx.store).tx_size_cost_per_byte;
        ctx.gas_meter
            .consume(ctx.tx_size.saturating_mul(cost), "transaction size")
    }
}
