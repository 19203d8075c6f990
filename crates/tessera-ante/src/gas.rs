use crate::error::AnteError;

/// Tracks gas consumed by one transaction against its declared limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
    limit: u64,
    consumed: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        GasMeter { limit, consumed: 0 }
    }

    /// Meter with no effective limit, installed until the fee's gas limit is known.
    pub fn infinite() -> Self {
        GasMeter::new(u64::MAX)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.consumed
    }

    /// Consumes `amount`; on overflow of the limit the meter is left unchanged.
    pub fn consume(&mut self, amount: u64, descriptor: &'static str) -> Result<(), AnteError> {
        let required = self.consumed.saturating_add(amount);
        if required > self.limit {
            return Err(AnteError::OutOfGas {
                descriptor,
                limit: self.limit,
                required,
            });
        }
        self.consumed = required;
        Ok(())
    }
}
