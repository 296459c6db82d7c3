//! # Service Session State Machine
//!
//! Lifecycle of one service request, from booking to completion or
//! cancellation.
//!
//! ## Transition Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Session Lifecycle                            │
//! │                                                                 │
//! │              check_in              complete                     │
//! │   Booking ────────────► InService ─────────► DoneService        │
//! │      │                                        (terminal)        │
//! │      │ cancel                                                   │
//! │      ▼                                                          │
//! │   Cancelled (terminal)                                          │
//! │                                                                 │
//! │   Anything not in this table is an InvalidTransition error.     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The table is closed: the database layer performs each transition as a
//! conditional update on the expected source state, and maps a zero
//! rows-affected result back through [`SessionStatus::apply`] to produce the
//! precise error.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Session Status
// =============================================================================

/// The status of a service session.
///
/// Stored as snake_case TEXT in the database (`booking`, `in_service`,
/// `done_service`, `cancelled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Booked, waiting for the visit. The only cancellable state.
    Booking,
    /// Staff checked the pet in; the visit is underway.
    InService,
    /// Visit finished; examination/prescription/vaccination records attached.
    /// Terminal success state - the session is immutable afterwards.
    DoneService,
    /// Cancelled before check-in. Terminal failure state.
    Cancelled,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Booking
    }
}

impl SessionStatus {
    /// True for states that admit no further transition.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::DoneService | SessionStatus::Cancelled)
    }
}

// =============================================================================
// Session Action
// =============================================================================

/// Requested transition on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Staff check-in: `Booking → InService`.
    CheckIn,
    /// Customer or staff cancellation: `Booking → Cancelled`.
    Cancel,
    /// Staff completes the visit: `InService → DoneService`.
    Complete,
}

impl SessionAction {
    /// The verb used in `InvalidTransition` messages.
    pub const fn verb(&self) -> &'static str {
        match self {
            SessionAction::CheckIn => "check in",
            SessionAction::Cancel => "cancel",
            SessionAction::Complete => "complete",
        }
    }

    /// The only source state from which this action is legal.
    pub const fn expected_from(&self) -> SessionStatus {
        match self {
            SessionAction::CheckIn | SessionAction::Cancel => SessionStatus::Booking,
            SessionAction::Complete => SessionStatus::InService,
        }
    }

    /// The state this action lands in.
    pub const fn target(&self) -> SessionStatus {
        match self {
            SessionAction::CheckIn => SessionStatus::InService,
            SessionAction::Cancel => SessionStatus::Cancelled,
            SessionAction::Complete => SessionStatus::DoneService,
        }
    }
}

impl SessionStatus {
    /// Applies an action to the current state.
    ///
    /// Returns the resulting state, or `InvalidTransition` naming the
    /// session, its current state and the rejected action.
    pub fn apply(self, session_id: &str, action: SessionAction) -> CoreResult<SessionStatus> {
        if self == action.expected_from() {
            Ok(action.target())
        } else {
            Err(CoreError::InvalidTransition {
                session_id: session_id.to_string(),
                from: self,
                action: action.verb(),
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
