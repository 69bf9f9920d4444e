//! OAuth phase state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//!   ┌──────┐ Begin  ┌────────────────────────┐  LinkOpened   ┌──────────────────┐
//!   │ Idle │ ─────► │ AuthorizationRequested │ ────────────► │ AwaitingCallback │
//!   └──────┘        └───────────┬────────────┘               └────────┬─────────┘
//!      ▲                        │ OpenerUnavailable                   │
//!      │ Cancel                 ▼                                     │
//!      │            ┌─────────────────────────┐                       │
//!      │            │ AwaitingExternalBrowser │                       │
//!      │            └───────────┬─────────────┘                       │
//!      │                        │ CredentialsReceived                 │
//!      │                        ▼                                     │
//!      │                ┌─────────────────┐ ◄─────────────────────────┘
//!      │                │ ExchangingToken │
//!      │                └────────┬────────┘
//!      │                         │ ExchangeSucceeded
//!      │                         ▼
//!      │                ┌──────────────────┐ SessionConfirmed ┌───────────┐
//!      └─────────────── │ VerifyingSession │ ───────────────► │ Completed │
//!                       └────────┬─────────┘                  └───────────┘
//!                                │ VerificationTimedOut
//!                                ▼
//!                           ┌────────┐
//!                           │ Failed │ (also reached via AuthorizationFailed,
//!                           └────────┘  CallbackRejected, ExchangeFailed)
//! ```
//!
//! A callback can arrive with no attempt started in this process (cold
//! launch), so `CredentialsReceived` and `CallbackRejected` are accepted from
//! `Idle`, `Completed` and `Failed` as well.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub oauth_machine(Idle)

    Idle => {
        Begin => AuthorizationRequested,
        CredentialsReceived => ExchangingToken,
        CallbackRejected => Failed
    },
    AuthorizationRequested => {
        LinkOpened => AwaitingCallback,
        OpenerUnavailable => AwaitingExternalBrowser,
        AuthorizationFailed => Failed,
        CredentialsReceived => ExchangingToken,
        CallbackRejected => Failed,
        Cancel => Idle
    },
    AwaitingExternalBrowser => {
        CredentialsReceived => ExchangingToken,
        CallbackRejected => Failed,
        Cancel => Idle
    },
    AwaitingCallback => {
        CredentialsReceived => ExchangingToken,
        CallbackRejected => Failed,
        Cancel => Idle
    },
    ExchangingToken => {
        ExchangeSucceeded => VerifyingSession,
        ExchangeFailed => Failed,
        Cancel => Idle
    },
    VerifyingSession => {
        SessionConfirmed => Completed,
        VerificationTimedOut => Failed,
        Cancel => Idle
    },
    Completed => {
        Begin => AuthorizationRequested,
        CredentialsReceived => ExchangingToken,
        CallbackRejected => Failed
    },
    Failed => {
        Begin => AuthorizationRequested,
        CredentialsReceived => ExchangingToken,
        CallbackRejected => Failed,
        Cancel => Idle
    }
}

pub use oauth_machine::Input as OAuthMachineInput;
pub use oauth_machine::State as OAuthMachineState;
pub use oauth_machine::StateMachine as OAuthMachine;

/// OAuth phase as exposed in [`crate::SessionState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthPhase {
    #[default]
    Idle,
    AuthorizationRequested,
    AwaitingExternalBrowser,
    AwaitingCallback,
    ExchangingToken,
    VerifyingSession,
    Completed,
    Failed,
}

impl OAuthPhase {
    /// Returns true while an attempt is in flight (between `Begin` and a
    /// terminal phase).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OAuthPhase::AuthorizationRequested
                | OAuthPhase::AwaitingExternalBrowser
                | OAuthPhase::AwaitingCallback
                | OAuthPhase::ExchangingToken
                | OAuthPhase::VerifyingSession
        )
    }

    /// Phases in which a pending authorization link may be shown.
    pub fn may_hold_pending_link(&self) -> bool {
        matches!(
            self,
            OAuthPhase::AuthorizationRequested | OAuthPhase::AwaitingExternalBrowser
        )
    }
}

impl From<&OAuthMachineState> for OAuthPhase {
    fn from(state: &OAuthMachineState) -> Self {
        match state {
            OAuthMachineState::Idle => OAuthPhase::Idle,
            OAuthMachineState::AuthorizationRequested => OAuthPhase::AuthorizationRequested,
            OAuthMachineState::AwaitingExternalBrowser => OAuthPhase::AwaitingExternalBrowser,
            OAuthMachineState::AwaitingCallback => OAuthPhase::AwaitingCallback,
            OAuthMachineState::ExchangingToken => OAuthPhase::ExchangingToken,
            OAuthMachineState::VerifyingSession => OAuthPhase::VerifyingSession,
            OAuthMachineState::Completed => OAuthPhase::Completed,
            OAuthMachineState::Failed => OAuthPhase::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(inputs: &[OAuthMachineInput]) -> OAuthMachine {
        let mut machine = OAuthMachine::new();
        for input in inputs {
            machine.consume(input).unwrap();
        }
        machine
    }

    #[test]
    fn test_initial_state_is_idle() {
        let machine = OAuthMachine::new();
        assert_eq!(*machine.state(), OAuthMachineState::Idle);
        assert_eq!(OAuthPhase::from(machine.state()), OAuthPhase::default());
    }

    #[test]
    fn test_browser_flow_to_completed() {
        let machine = drive(&[
            OAuthMachineInput::Begin,
            OAuthMachineInput::LinkOpened,
            OAuthMachineInput::CredentialsReceived,
            OAuthMachineInput::ExchangeSucceeded,
            OAuthMachineInput::SessionConfirmed,
        ]);
        assert_eq!(*machine.state(), OAuthMachineState::Completed);
    }

    #[test]
    fn test_manual_link_flow() {
        let machine = drive(&[
            OAuthMachineInput::Begin,
            OAuthMachineInput::OpenerUnavailable,
        ]);
        assert_eq!(*machine.state(), OAuthMachineState::AwaitingExternalBrowser);

        let machine = drive(&[
            OAuthMachineInput::Begin,
            OAuthMachineInput::OpenerUnavailable,
            OAuthMachineInput::CredentialsReceived,
        ]);
        assert_eq!(*machine.state(), OAuthMachineState::ExchangingToken);
    }

    #[test]
    fn test_verification_timeout_fails() {
        let machine = drive(&[
            OAuthMachineInput::Begin,
            OAuthMachineInput::LinkOpened,
            OAuthMachineInput::CredentialsReceived,
            OAuthMachineInput::ExchangeSucceeded,
            OAuthMachineInput::VerificationTimedOut,
        ]);
        assert_eq!(*machine.state(), OAuthMachineState::Failed);
    }

    #[test]
    fn test_cold_launch_callback_from_idle() {
        let machine = drive(&[OAuthMachineInput::CredentialsReceived]);
        assert_eq!(*machine.state(), OAuthMachineState::ExchangingToken);

        let machine = drive(&[OAuthMachineInput::CallbackRejected]);
        assert_eq!(*machine.state(), OAuthMachineState::Failed);
    }

    #[test]
    fn test_cannot_begin_while_active() {
        let mut machine = drive(&[OAuthMachineInput::Begin]);
        assert!(machine.consume(&OAuthMachineInput::Begin).is_err());

        machine.consume(&OAuthMachineInput::LinkOpened).unwrap();
        assert!(machine.consume(&OAuthMachineInput::Begin).is_err());
        assert_eq!(*machine.state(), OAuthMachineState::AwaitingCallback);
    }

    #[test]
    fn test_cannot_skip_exchange() {
        let mut machine = drive(&[OAuthMachineInput::Begin, OAuthMachineInput::LinkOpened]);

        assert!(machine
            .consume(&OAuthMachineInput::SessionConfirmed)
            .is_err());
        assert!(machine
            .consume(&OAuthMachineInput::ExchangeSucceeded)
            .is_err());
        assert_eq!(*machine.state(), OAuthMachineState::AwaitingCallback);
    }

    #[test]
    fn test_cancel_from_every_active_phase() {
        let paths: &[&[OAuthMachineInput]] = &[
            &[OAuthMachineInput::Begin],
            &[OAuthMachineInput::Begin, OAuthMachineInput::OpenerUnavailable],
            &[OAuthMachineInput::Begin, OAuthMachineInput::LinkOpened],
            &[OAuthMachineInput::CredentialsReceived],
            &[
                OAuthMachineInput::CredentialsReceived,
                OAuthMachineInput::ExchangeSucceeded,
            ],
        ];
        for path in paths {
            let mut machine = drive(path);
            assert!(OAuthPhase::from(machine.state()).is_active());
            machine.consume(&OAuthMachineInput::Cancel).unwrap();
            assert_eq!(*machine.state(), OAuthMachineState::Idle);
        }
    }

    #[test]
    fn test_cancel_rejected_when_idle_or_completed() {
        let mut idle = OAuthMachine::new();
        assert!(idle.consume(&OAuthMachineInput::Cancel).is_err());

        let mut completed = drive(&[
            OAuthMachineInput::CredentialsReceived,
            OAuthMachineInput::ExchangeSucceeded,
            OAuthMachineInput::SessionConfirmed,
        ]);
        assert!(completed.consume(&OAuthMachineInput::Cancel).is_err());
    }

    #[test]
    fn test_retry_after_failure() {
        let machine = drive(&[
            OAuthMachineInput::Begin,
            OAuthMachineInput::AuthorizationFailed,
            OAuthMachineInput::Begin,
        ]);
        assert_eq!(*machine.state(), OAuthMachineState::AuthorizationRequested);
    }

    #[test]
    fn test_phase_helpers() {
        assert!(!OAuthPhase::Idle.is_active());
        assert!(OAuthPhase::AwaitingCallback.is_active());
        assert!(OAuthPhase::VerifyingSession.is_active());
        assert!(!OAuthPhase::Completed.is_active());
        assert!(!OAuthPhase::Failed.is_active());

        assert!(OAuthPhase::AwaitingExternalBrowser.may_hold_pending_link());
        assert!(!OAuthPhase::AwaitingCallback.may_hold_pending_link());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&OAuthPhase::AwaitingExternalBrowser).unwrap();
        assert_eq!(json, "\"awaiting_external_browser\"");
    }
}
