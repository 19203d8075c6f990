// ADMISSION DRIVER
// Runs the ordered stages over one transaction, stopping at the first
// failure. The driver is also the panic boundary: a panic in any stage is
// converted into an ordinary error for that transaction only.
//
// SAFETY INVARIANTS:
// 1. Stages run in registration order, each at most once per transaction
// 2. No stage runs after a failing stage
// 3. A panic never escapes `run`

use crate::context::AnteContext;
use crate::error::AnteError;
use crate::keepers::{AccountKeeper, FeeExecutor, ParamsProvider, RelayTracker, SignatureVerifier};
use crate::stages::{
    BlobChecks, ConsumeTxSizeGas, DeductFee, MaxTxSize, MessageGate, ProposalFilter, RedundantRelay,
    SetUpGasMeter, SigVerification, StructuralChecks,
};
use log::debug;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tessera_types::accepted::AcceptedMessageSet;
use tessera_types::tx::Tx;

/// One admission check. A stage may reject or mutate the context.
pub trait AnteStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<(), AnteError>;
}

/// Result of a successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnteOutcome {
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub priority: u64,
}

/// Collaborators the standard stages are wired to.
#[derive(Clone)]
pub struct AnteDeps {
    pub accepted: Arc<AcceptedMessageSet>,
    pub accounts: Arc<dyn AccountKeeper>,
    pub fees: Arc<dyn FeeExecutor>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub params: Arc<dyn ParamsProvider>,
    pub relays: Arc<dyn RelayTracker>,
}

pub struct AnteHandler {
    stages: Vec<Box<dyn AnteStage>>,
}

impl AnteHandler {
    pub fn new(stages: Vec<Box<dyn AnteStage>>) -> Self {
        AnteHandler { stages }
    }

    /// The full admission chain in its fixed order.
    pub fn standard(deps: AnteDeps) -> Self {
        AnteHandler::new(vec![
            Box::new(MessageGate::new(deps.accepted.clone())),
            Box::new(SetUpGasMeter),
            Box::new(MaxTxSize),
            Box::new(StructuralChecks::new(deps.params.clone())),
            Box::new(ConsumeTxSizeGas::new(deps.params.clone())),
            Box::new(DeductFee::new(deps.fees.clone(), deps.params.clone())),
            Box::new(SigVerification::new(
                deps.accounts.clone(),
                deps.verifier.clone(),
                deps.params.clone(),
            )),
            Box::new(BlobChecks::new(deps.params.clone())),
            Box::new(ProposalFilter::new()),
            Box::new(RedundantRelay::new(deps.relays)),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<AnteOutcome, AnteError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(ctx, tx))) {
            Ok(result) => result,
            Err(payload) => Err(AnteError::Panic(panic_message(payload))),
        }
    }

    fn run_stages(&self, ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<AnteOutcome, AnteError> {
        for stage in &self.stages {
            if let Err(e) = stage.check(ctx, tx) {
                debug!("Admission stage {} rejected transaction: {}", stage.name(), e);
                return Err(e);
            }
        }
        Ok(AnteOutcome {
            gas_wanted: ctx.gas_meter.limit(),
            gas_used: ctx.gas_meter.consumed(),
            priority: ctx.priority,
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tessera_types::store::MemStore;
    use tessera_types::version::ProtocolVersion;

    struct Counting(Arc<AtomicUsize>);

    impl AnteStage for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn check(&self, _ctx: &mut AnteContext<'_>, _tx: &Tx) -> Result<(), AnteError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl AnteStage for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn check(&self, _ctx: &mut AnteContext<'_>, _tx: &Tx) -> Result<(), AnteError> {
            Err(AnteError::EmptyProposal)
        }
    }

    struct Panicking;

    impl AnteStage for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn check(&self, _ctx: &mut AnteContext<'_>, _tx: &Tx) -> Result<(), AnteError> {
            panic!("stage blew up")
        }
    }

    fn empty_tx() -> Tx {
        Tx::new(
            vec![],
            tessera_types::tx::Fee { amount: vec![], gas_limit: 1, payer: None, granter: None },
            vec![],
        )
    }

    #[test]
    fn test_short_circuits_on_failure() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = AnteHandler::new(vec![
            Box::new(Counting(count.clone())),
            Box::new(Failing),
            Box::new(Counting(count.clone())),
        ]);
        let mut store = MemStore::new();
        let mut ctx = AnteContext::new(&mut store, "c", 1, ProtocolVersion::V1, ExecMode::Deliver, 0);
        assert_eq!(handler.run(&mut ctx, &empty_tx()), Err(AnteError::EmptyProposal));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_is_contained() {
        let handler = AnteHandler::new(vec![Box::new(Panicking)]);
        let mut store = MemStore::new();
        let mut ctx = AnteContext::new(&mut store, "c", 1, ProtocolVersion::V1, ExecMode::Deliver, 0);
        assert_eq!(
            handler.run(&mut ctx, &empty_tx()),
            Err(AnteError::Panic("stage blew up".into()))
        );
    }
}
