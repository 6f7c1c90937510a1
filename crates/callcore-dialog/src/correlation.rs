use callcore_message::Method;

/// Lifecycle of a [`TransactionCorrelation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CorrelationState {
    Active,
    Completed,
    Terminated,
}

/// An opaque identifier for a correlation, independent of either leg's
/// own transaction id so it survives either leg being renamed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CorrelationId(uuid::Uuid);

impl CorrelationId {
    fn new() -> Self {
        CorrelationId(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pairs the A-leg and B-leg transaction ids for one forwarded
/// request. Created when the B2BUA forwards a request onto the
/// opposite leg; closed when the final response is relayed back.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TransactionCorrelation {
    id: CorrelationId,
    a_leg_txn: String,
    b_leg_txn: String,
    method: Method,
    state: CorrelationState,
}

impl TransactionCorrelation {
    pub(crate) fn new(a_leg_txn: String, b_leg_txn: String, method: Method) -> Self {
        TransactionCorrelation {
            id: CorrelationId::new(),
            a_leg_txn,
            b_leg_txn,
            method,
            state: CorrelationState::Active,
        }
    }

    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    pub fn a_leg_txn(&self) -> &str {
        &self.a_leg_txn
    }

    pub fn b_leg_txn(&self) -> &str {
        &self.b_leg_txn
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn state(&self) -> CorrelationState {
        self.state
    }

    pub(crate) fn complete(&mut self) {
        if self.state == CorrelationState::Active {
            self.state = CorrelationState::Completed;
        }
    }

    pub(crate) fn terminate(&mut self) {
        self.state = CorrelationState::Terminated;
    }
}
