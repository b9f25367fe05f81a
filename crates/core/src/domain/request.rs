use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// The triage-relevant shape of an incoming quote request.
///
/// Counts are unsigned on purpose: upstream intake sanitizes missing or
/// negative values to zero before this type is ever constructed, and the
/// type keeps it that way.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageInput {
    pub photo_count: u32,
    pub description: String,
    pub customer_email: String,
    pub tenant_id: String,
    pub tenant_service_count: u32,
    pub has_other_services: bool,
    /// Distinct work steps the intake-time AI pass spotted in the narrative.
    pub work_step_count: u32,
}

#[cfg(test)]
mod tests {
    use super::TriageInput;

    #[test]
    fn triage_input_round_trips_through_json() {
        let input = TriageInput {
            photo_count: 2,
            description: "Replace three fence panels".to_string(),
            customer_email: "sam@example.com".to_string(),
            tenant_id: "tenant-7".to_string(),
            tenant_service_count: 4,
            has_other_services: true,
            work_step_count: 1,
        };

        let json = serde_json::to_string(&input).expect("serialize");
        let back: TriageInput = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, input);
    }
}
