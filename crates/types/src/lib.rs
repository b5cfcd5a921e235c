//! Validated primitive types shared across the workspace.
//!
//! Currently just the patient identifier used by the dataset, the reports and the API.

/// Errors that can occur when creating a `PatientId`.
#[derive(Debug, thiserror::Error)]
pub enum PatientIdError {
    /// The input text was empty or contained only whitespace
    #[error("Patient ID cannot be empty")]
    Empty,
}

/// Identifier of a patient row in the dataset.
///
/// Identifiers are opaque: `"7"` and `"07"` are different patients, and a numeric-looking
/// identifier is never converted to a number. Surrounding whitespace is trimmed so that
/// identifiers read from a CSV cell and identifiers taken from a URL path compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatientId(String);

impl PatientId {
    /// Creates a new `PatientId`, returning `PatientIdError::Empty` when the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, PatientIdError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(PatientIdError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for PatientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for PatientId {
    type Err = PatientIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for PatientId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PatientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PatientId::new(&s).map_err(serde::de::Error::custom)
    }
}
