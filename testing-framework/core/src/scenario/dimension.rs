use std::collections::BTreeMap;

use thiserror::Error;

/// Expected value of a metric dimension.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExpectedDimensionValue {
    Known(String),
    /// Filled in at runtime from host metadata (e.g. the instance id).
    Unknown,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DimensionInstruction {
    pub key: String,
    pub value: ExpectedDimensionValue,
}

impl DimensionInstruction {
    #[must_use]
    pub fn known(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ExpectedDimensionValue::Known(value.into()),
        }
    }

    #[must_use]
    pub fn unknown(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ExpectedDimensionValue::Unknown,
        }
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
#[error("no runtime value available for dimension '{key}'")]
pub struct DimensionError {
    pub key: String,
}

/// Resolves dimension instructions into concrete `(key, value)` pairs.
#[derive(Clone, Debug, Default)]
pub struct DimensionFactory {
    runtime_values: BTreeMap<String, String>,
}

impl DimensionFactory {
    pub const INSTANCE_ID_KEY: &'static str = "InstanceId";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory seeded from the harness environment (`APM_INSTANCE_ID`).
    #[must_use]
    pub fn from_env() -> Self {
        let factory = Self::new();
        match apm_testing_env::apm_instance_id() {
            Some(instance_id) => factory.with_value(Self::INSTANCE_ID_KEY, instance_id),
            None => factory,
        }
    }

    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.runtime_values.insert(key.into(), value.into());
        self
    }

    pub fn resolve(
        &self,
        instructions: &[DimensionInstruction],
    ) -> Result<Vec<(String, String)>, DimensionError> {
        instructions
            .iter()
            .map(|instruction| {
                let value = match &instruction.value {
                    ExpectedDimensionValue::Known(value) => value.clone(),
                    ExpectedDimensionValue::Unknown => self
                        .runtime_values
                        .get(&instruction.key)
                        .cloned()
                        .ok_or_else(|| DimensionError {
                            key: instruction.key.clone(),
                        })?,
                };
                Ok((instruction.key.clone(), value))
            })
            .collect()
    }
}
