//! Outcome vocabulary returned to the orchestrator.
//!
//! Every stage answers with a [`Status`]. Policy outcomes (`Unschedulable`,
//! `Wait`) are ordinary values; `Error` is reserved for infrastructure
//! failures and cancellation so the orchestrator can tell "policy said no"
//! from "the system is broken".

use std::fmt;

use podgate_state::StateError;

/// Status code of a stage outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Success,
    /// Policy rejection; the workload may be retried in a later cycle.
    Unschedulable,
    /// Infrastructure failure or cancellation; the cycle is aborted.
    Error,
    /// Hold the binding and ask again after the returned delay.
    Wait,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Code::Success => "Success",
            Code::Unschedulable => "Unschedulable",
            Code::Error => "Error",
            Code::Wait => "Wait",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: Code,
    reasons: Vec<String>,
}

impl Status {
    pub fn new(code: Code, reasons: Vec<String>) -> Self {
        Self { code, reasons }
    }

    pub fn success() -> Self {
        Self::new(Code::Success, Vec::new())
    }

    pub fn unschedulable(reason: impl Into<String>) -> Self {
        Self::new(Code::Unschedulable, vec![reason.into()])
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self::new(Code::Error, vec![detail.into()])
    }

    pub fn wait(reason: impl Into<String>) -> Self {
        Self::new(Code::Wait, vec![reason.into()])
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    /// All reasons joined with `"; "`.
    pub fn message(&self) -> String {
        self.reasons.join("; ")
    }

    pub fn is_success(&self) -> bool {
        self.code == Code::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reasons.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message())
        }
    }
}

/// Infrastructure failures surface verbatim as `Error`.
impl From<StateError> for Status {
    fn from(err: StateError) -> Self {
        Status::error(err.to_string())
    }
}
