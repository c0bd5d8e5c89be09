use serde_json::json;

use crate::types::{seed_of, Backend, GenerateParams, Generation};

/// Deterministic string transforms used when no model is wired in.
#[derive(Clone, Copy, Debug)]
pub enum LocalTransform {
    Echo,
    Upper,
    Reverse,
}

#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    transform: LocalTransform,
}

impl LocalBackend {
    pub fn new(name: impl Into<String>, transform: LocalTransform) -> Self {
        Self { name: name.into(), transform }
    }

    pub fn echo() -> Self {
        Self::new("echo", LocalTransform::Echo)
    }

    pub fn upper() -> Self {
        Self::new("upper", LocalTransform::Upper)
    }

    pub fn reverse() -> Self {
        Self::new("reverse", LocalTransform::Reverse)
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, prompt: &str, params: &GenerateParams) -> Generation {
        let text = match self.transform {
            LocalTransform::Echo => prompt.to_string(),
            LocalTransform::Upper => prompt.to_uppercase(),
            LocalTransform::Reverse => prompt.chars().rev().collect(),
        };
        Generation {
            text,
            meta: json!({ "engine": format!("fallback:{}", self.name), "seed": seed_of(params) }),
        }
    }
}
