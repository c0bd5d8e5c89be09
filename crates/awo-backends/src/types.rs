use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type GenerateParams = Map<String, Value>;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Generation {
    pub text: String,
    pub meta: Value,
}

/// A text-generation backend. Implementations must be pure with respect to
/// `(prompt, params)`; a backend holding state must be constructed per run.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Reported in provenance as the actor version.
    fn version(&self) -> &str {
        "fallback"
    }

    fn provider(&self) -> &str {
        "local"
    }

    fn generate(&self, prompt: &str, params: &GenerateParams) -> Generation;
}

/// `seed` from params, defaulting to 0.
pub fn seed_of(params: &GenerateParams) -> i64 {
    params.get("seed").and_then(Value::as_i64).unwrap_or(0)
}
