//! Best-effort customer history lookup used by triage.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("history backend unavailable: {0}")]
    Unavailable(String),
}

/// How many quotes this customer has received from this tenant before.
///
/// Implementations may hit a database or a remote CRM. Triage never blocks
/// on them: callers resolve the count up front through
/// [`resolve_previous_quote_count`], which treats any failure as zero.
pub trait PreviousQuoteLookup: Send + Sync {
    fn previous_quote_count(
        &self,
        customer_email: &str,
        tenant_id: &str,
    ) -> Result<u32, LookupError>;
}

/// Failure never reaches the classifier: an errored lookup means the
/// customer is treated as new.
pub fn resolve_previous_quote_count(
    lookup: &dyn PreviousQuoteLookup,
    customer_email: &str,
    tenant_id: &str,
) -> u32 {
    lookup.previous_quote_count(customer_email, tenant_id).unwrap_or(0)
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryPreviousQuoteLookup {
    counts: HashMap<(String, String), u32>,
}

impl InMemoryPreviousQuoteLookup {
    pub fn insert_count(&mut self, customer_email: &str, tenant_id: &str, count: u32) {
        self.counts.insert((customer_email.to_string(), tenant_id.to_string()), count);
    }
}

impl PreviousQuoteLookup for InMemoryPreviousQuoteLookup {
    fn previous_quote_count(
        &self,
        customer_email: &str,
        tenant_id: &str,
    ) -> Result<u32, LookupError> {
        Ok(self
            .counts
            .get(&(customer_email.to_string(), tenant_id.to_string()))
            .copied()
            .unwrap_or(0))
    }
}
