use serde::Serialize;

/// A pod as it appeared in one namespace listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PodDescriptor {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<String>,
}

impl PodDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: None,
        }
    }

    #[must_use]
    pub fn with_phase(mut self, phase: Option<String>) -> Self {
        self.phase = phase;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pod status phase (`Running`, `Succeeded`, ...) when the listing
    /// reported one.
    #[must_use]
    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }
}

/// Log bytes read from one pod. Owned by a single fetch-and-persist unit.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LogPayload(Vec<u8>);

impl LogPayload {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for LogPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
