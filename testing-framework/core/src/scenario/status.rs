use std::fmt;

use serde::Serialize;

/// Outcome of a single check.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Successful,
    Failed,
}

impl Status {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Successful => "SUCCESSFUL",
            Self::Failed => "FAILED",
        }
    }

    #[must_use]
    pub const fn is_successful(self) -> bool {
        matches!(self, Self::Successful)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TestResult {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TestResult {
    #[must_use]
    pub fn successful(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Status::Successful,
            detail: None,
        }
    }

    #[must_use]
    pub fn failed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Status::Failed,
            detail: Some(detail.into()),
        }
    }
}

/// Named collection of results; passes only when every member passes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TestGroupResult {
    pub name: String,
    #[serde(rename = "results")]
    pub test_results: Vec<TestResult>,
}

impl TestGroupResult {
    #[must_use]
    pub fn new(name: impl Into<String>, test_results: Vec<TestResult>) -> Self {
        Self {
            name: name.into(),
            test_results,
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        if self
            .test_results
            .iter()
            .all(|result| result.status.is_successful())
        {
            Status::Successful
        } else {
            Status::Failed
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.test_results
            .iter()
            .filter(|result| !result.status.is_successful())
    }
}

impl fmt::Display for TestGroupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .test_results
            .iter()
            .map(|result| result.name.len())
            .max()
            .unwrap_or(0)
            .max(self.name.len());

        writeln!(f, "==== {} ({}) ====", self.name, self.status())?;
        for result in &self.test_results {
            write!(f, "{:<width$} | {}", result.name, result.status)?;
            if let Some(detail) = &result.detail {
                write!(f, " | {detail}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
