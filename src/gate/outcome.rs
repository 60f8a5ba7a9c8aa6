use crate::error::GateError;
use crate::router::RouteMatch;
use http::StatusCode;
use std::fmt;

/// Where in the pipeline a request was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Resolving,
    Validating,
    Authenticating,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Resolving => "resolving",
            Stage::Validating => "validating",
            Stage::Authenticating => "authenticating",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal rejection, carrying the status the response should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub stage: Stage,
    pub error: GateError,
    pub status: StatusCode,
}

impl Denial {
    pub(crate) fn new(stage: Stage, error: GateError) -> Self {
        let status = error.status();
        Self { stage, error, status }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} while {})", self.error, self.status.as_u16(), self.stage)
    }
}

/// Exactly one per checked request.
#[derive(Debug, Clone)]
pub enum Outcome {
    Allowed(RouteMatch),
    Denied(Denial),
}

impl Outcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allowed(_))
    }

    pub fn route_match(&self) -> Option<&RouteMatch> {
        match self {
            Outcome::Allowed(matched) => Some(matched),
            Outcome::Denied(_) => None,
        }
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Outcome::Allowed(_) => None,
            Outcome::Denied(denial) => Some(denial),
        }
    }

    /// HTTP status implied by the outcome; `None` when the handler decides.
    pub fn status(&self) -> Option<StatusCode> {
        self.denial().map(|d| d.status)
    }
}
