use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line of an externally computed price breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLineItem {
    pub label: String,
    pub amount: Decimal,
}

/// Result of the external pricing computation. This core never prices a
/// quote itself; the quality gate only inspects the outcome for sanity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub total: Decimal,
    pub breakdown: Vec<PriceLineItem>,
}

impl PricingResult {
    pub fn line_item(label: impl Into<String>, amount: Decimal) -> PriceLineItem {
        PriceLineItem { label: label.into(), amount }
    }

    /// A non-positive total with configured work steps points at a pricing
    /// configuration problem rather than a legitimately free job.
    pub fn looks_misconfigured(&self) -> bool {
        self.total <= Decimal::ZERO && !self.breakdown.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::PricingResult;

    #[test]
    fn zero_total_with_breakdown_is_misconfigured() {
        let pricing = PricingResult {
            total: Decimal::ZERO,
            breakdown: vec![PricingResult::line_item("Panel replacement", Decimal::new(12_000, 2))],
        };
        assert!(pricing.looks_misconfigured());
    }

    #[test]
    fn zero_total_without_breakdown_is_not_flagged() {
        let pricing = PricingResult { total: Decimal::ZERO, breakdown: Vec::new() };
        assert!(!pricing.looks_misconfigured());
    }

    #[test]
    fn positive_total_is_not_flagged() {
        let pricing = PricingResult {
            total: Decimal::new(50_000, 2),
            breakdown: vec![PricingResult::line_item("Labor", Decimal::new(50_000, 2))],
        };
        assert!(!pricing.looks_misconfigured());
    }
}
