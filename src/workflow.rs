// src/workflow.rs
//! Upload flow for the screenshot converter, kept apart from the network
//! call so the view can be driven and tested on its own.

use crate::errors::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversionPhase {
    #[default]
    Idle,
    Compressing {
        original: String,
    },
    Uploading {
        original: String,
    },
    Succeeded {
        original: String,
        transformed: String,
    },
    Failed {
        original: String,
        code: ErrorCode,
    },
}

impl ConversionPhase {
    fn name(&self) -> &'static str {
        match self {
            ConversionPhase::Idle => "idle",
            ConversionPhase::Compressing { .. } => "compressing",
            ConversionPhase::Uploading { .. } => "uploading",
            ConversionPhase::Succeeded { .. } => "succeeded",
            ConversionPhase::Failed { .. } => "failed",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot {action} while {phase}")]
pub struct TransitionError {
    pub action: &'static str,
    pub phase: &'static str,
}

/// What the error view should offer the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Retry,
    ChooseNewFile,
    ContactSupport,
}

/// Flat view model consumed by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionState {
    pub original: Option<String>,
    pub transformed: Option<String>,
    pub is_processing: bool,
    pub error: Option<String>,
    pub error_code: Option<ErrorCode>,
}

#[derive(Debug, Clone, Default)]
pub struct ConversionFlow {
    phase: ConversionPhase,
}

impl ConversionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &ConversionPhase {
        &self.phase
    }

    fn reject(&self, action: &'static str) -> TransitionError {
        TransitionError {
            action,
            phase: self.phase.name(),
        }
    }

    /// A file was picked. Any previous result is discarded first.
    pub fn select(&mut self, original: impl Into<String>) -> Result<(), TransitionError> {
        match self.phase {
            ConversionPhase::Compressing { .. } | ConversionPhase::Uploading { .. } => {
                Err(self.reject("select a file"))
            }
            _ => {
                self.phase = ConversionPhase::Compressing {
                    original: original.into(),
                };
                Ok(())
            }
        }
    }

    pub fn compressed(&mut self) -> Result<(), TransitionError> {
        match std::mem::take(&mut self.phase) {
            ConversionPhase::Compressing { original } => {
                self.phase = ConversionPhase::Uploading { original };
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.reject("finish compression"))
            }
        }
    }

    pub fn succeed(&mut self, transformed: impl Into<String>) -> Result<(), TransitionError> {
        match std::mem::take(&mut self.phase) {
            ConversionPhase::Uploading { original } => {
                self.phase = ConversionPhase::Succeeded {
                    original,
                    transformed: transformed.into(),
                };
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.reject("accept a result"))
            }
        }
    }

    pub fn fail(&mut self, code: ErrorCode) -> Result<(), TransitionError> {
        match std::mem::take(&mut self.phase) {
            ConversionPhase::Compressing { original } | ConversionPhase::Uploading { original } => {
                self.phase = ConversionPhase::Failed { original, code };
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.reject("record a failure"))
            }
        }
    }

    /// "Start new": always allowed.
    pub fn reset(&mut self) {
        self.phase = ConversionPhase::Idle;
    }

    pub fn state(&self) -> ConversionState {
        match &self.phase {
            ConversionPhase::Idle => ConversionState::default(),
            ConversionPhase::Compressing { original } | ConversionPhase::Uploading { original } => {
                ConversionState {
                    original: Some(original.clone()),
                    is_processing: true,
                    ..Default::default()
                }
            }
            ConversionPhase::Succeeded {
                original,
                transformed,
            } => ConversionState {
                original: Some(original.clone()),
                transformed: Some(transformed.clone()),
                ..Default::default()
            },
            ConversionPhase::Failed { original, code } => ConversionState {
                original: Some(original.clone()),
                error: Some(code.display().message.to_string()),
                error_code: Some(*code),
                ..Default::default()
            },
        }
    }

    pub fn next_action(&self) -> Option<NextAction> {
        match &self.phase {
            ConversionPhase::Failed { code, .. } if code.is_recoverable() => Some(NextAction::Retry),
            ConversionPhase::Failed { code, .. } if code.requires_user_action() => {
                Some(NextAction::ChooseNewFile)
            }
            ConversionPhase::Failed { .. } => Some(NextAction::ContactSupport),
            _ => None,
        }
    }
}
