use std::fmt;

/// Opaque server-issued identifier; primary key for all session calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SessionToken(String);

impl SessionToken {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuestionVariant {
    Ordering,
    Matching,
}

impl QuestionVariant {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Ordering => "ORDERING",
            Self::Matching => "MATCHING",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ORDERING" => Some(Self::Ordering),
            "MATCHING" => Some(Self::Matching),
            _ => None,
        }
    }
}
