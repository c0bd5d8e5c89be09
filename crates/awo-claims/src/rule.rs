use serde_json::Value;

use crate::types::{Claim, Finding};

pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn eval(&self, claim: &Claim) -> Vec<Finding>;

    fn finding(&self, message: impl Into<String>) -> Finding
    where
        Self: Sized,
    {
        Finding { rule_id: self.id().to_string(), message: message.into() }
    }
}

/// Order matters: problems are reported in rule order.
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(RequiredFieldsRule),
        Box::new(TestableRule),
        Box::new(PredictionToleranceRule),
        Box::new(FalsificationConditionRule),
    ]
}

pub struct RequiredFieldsRule;

impl Rule for RequiredFieldsRule {
    fn id(&self) -> &str {
        "required_fields"
    }

    fn eval(&self, claim: &Claim) -> Vec<Finding> {
        let mut out = Vec::new();
        for (name, value) in [("id", &claim.id), ("statement", &claim.statement)] {
            if value.as_deref().map_or(true, str::is_empty) {
                out.push(self.finding(format!("missing field: {name}")));
            }
        }
        out
    }
}

pub struct TestableRule;

impl Rule for TestableRule {
    fn id(&self) -> &str {
        "testable"
    }

    fn eval(&self, claim: &Claim) -> Vec<Finding> {
        if claim.predictions().is_empty() && claim.falsification_tests().is_empty() {
            return vec![self.finding("claim is not testable: no predictions and no falsification_tests")];
        }
        vec![]
    }
}

pub struct PredictionToleranceRule;

impl Rule for PredictionToleranceRule {
    fn id(&self) -> &str {
        "prediction_tolerance"
    }

    fn eval(&self, claim: &Claim) -> Vec<Finding> {
        claim
            .predictions()
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.get("tolerance").is_some_and(is_truthy))
            .map(|(i, _)| self.finding(format!("prediction[{i}] missing tolerance")))
            .collect()
    }
}

pub struct FalsificationConditionRule;

impl Rule for FalsificationConditionRule {
    fn id(&self) -> &str {
        "falsification_condition"
    }

    fn eval(&self, claim: &Claim) -> Vec<Finding> {
        claim
            .falsification_tests()
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                !t.as_object()
                    .is_some_and(|o| o.contains_key("must_pass") || o.contains_key("fail_if"))
            })
            .map(|(i, _)| self.finding(format!("falsification_tests[{i}] missing must_pass/fail_if")))
            .collect()
    }
}

/// A tolerance of `0`, `""`, `false`, `null` or an empty container does not count.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_tolerance_counts_as_missing() {
        let claim = Claim::from_value(&json!({
            "id": "c", "statement": "s", "predictions": [{"tolerance": 0}, {"tolerance": 0.1}]
        }))
        .unwrap();
        let findings = PredictionToleranceRule.eval(&claim);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "prediction_tolerance");
        assert_eq!(findings[0].message, "prediction[0] missing tolerance");
    }

    #[test]
    fn empty_lists_are_not_testable() {
        let claim = Claim::from_value(&json!({
            "id": "c", "statement": "s", "predictions": [], "falsification_tests": []
        }))
        .unwrap();
        assert_eq!(TestableRule.eval(&claim).len(), 1);
    }
}
