//! Claim testability checks.
//!
//! A claim is testable iff it carries at least one prediction with a
//! tolerance or at least one falsification test with a recognizable
//! pass/fail condition. Findings are reported, never enforced here.

pub mod rule;
pub mod types;

pub use rule::*;
pub use types::*;

use serde_json::Value;

/// Runs every default rule against a parsed claim.
pub fn check_claim(claim: &Claim) -> TestabilityReport {
    let findings: Vec<Finding> = default_rules().iter().flat_map(|r| r.eval(claim)).collect();
    TestabilityReport::from_findings(findings)
}

/// Like [`check_claim`] but accepts the raw document; a document that does not
/// even parse as a claim is reported as a single problem.
pub fn check_claim_value(doc: &Value) -> TestabilityReport {
    match Claim::from_value(doc) {
        Ok(claim) => check_claim(&claim),
        Err(e) => TestabilityReport::from_findings(vec![Finding {
            rule_id: "well_formed".to_string(),
            message: format!("malformed claim: {e}"),
        }]),
    }
}
