//! Onboarding state machine: tracks which question the user is answering.

use serde::{Deserialize, Serialize};

/// The steps of the onboarding questionnaire.
///
/// Progresses linearly: New → AwaitGender → AwaitActivity → AwaitAge →
/// AwaitWeight → AwaitHeight → Done. Reset jumps back to AwaitGender from
/// anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingState {
    #[default]
    New,
    AwaitGender,
    AwaitActivity,
    AwaitAge,
    AwaitWeight,
    AwaitHeight,
    Done,
}

impl OnboardingState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: OnboardingState) -> bool {
        use OnboardingState::*;
        if target == AwaitGender {
            // First contact, or reset from any state.
            return true;
        }
        matches!(
            (self, target),
            (AwaitGender, AwaitActivity)
                | (AwaitActivity, AwaitAge)
                | (AwaitAge, AwaitWeight)
                | (AwaitWeight, AwaitHeight)
                | (AwaitHeight, Done)
        )
    }

    /// Whether this state is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::AwaitGender => "await_gender",
            Self::AwaitActivity => "await_activity",
            Self::AwaitAge => "await_age",
            Self::AwaitWeight => "await_weight",
            Self::AwaitHeight => "await_height",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for OnboardingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OnboardingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "await_gender" => Ok(Self::AwaitGender),
            "await_activity" => Ok(Self::AwaitActivity),
            "await_age" => Ok(Self::AwaitAge),
            "await_weight" => Ok(Self::AwaitWeight),
            "await_height" => Ok(Self::AwaitHeight),
            "done" => Ok(Self::Done),
            other => Err(format!("unknown onboarding state: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OnboardingState; 7] = [
        OnboardingState::New,
        OnboardingState::AwaitGender,
        OnboardingState::AwaitActivity,
        OnboardingState::AwaitAge,
        OnboardingState::AwaitWeight,
        OnboardingState::AwaitHeight,
        OnboardingState::Done,
    ];

    #[test]
    fn valid_transitions() {
        use OnboardingState::*;
        let transitions = [
            (New, AwaitGender),
            (AwaitGender, AwaitActivity),
            (AwaitActivity, AwaitAge),
            (AwaitAge, AwaitWeight),
            (AwaitWeight, AwaitHeight),
            (AwaitHeight, Done),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use OnboardingState::*;
        // Skip steps
        assert!(!AwaitGender.can_transition_to(AwaitAge));
        assert!(!AwaitAge.can_transition_to(Done));
        // Go backward (other than reset)
        assert!(!AwaitWeight.can_transition_to(AwaitAge));
        // Nothing leaves Done except reset
        assert!(!Done.can_transition_to(AwaitHeight));
        assert!(!Done.can_transition_to(New));
    }

    #[test]
    fn reset_is_valid_from_every_state() {
        for state in ALL {
            assert!(state.can_transition_to(OnboardingState::AwaitGender));
        }
    }

    #[test]
    fn default_is_new_and_only_done_is_terminal() {
        assert_eq!(OnboardingState::default(), OnboardingState::New);
        for state in ALL {
            assert_eq!(state.is_terminal(), state == OnboardingState::Done, "{state}");
        }
    }

    #[test]
    fn display_matches_serde_and_parse() {
        for state in ALL {
            let display = format!("{state}");
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(format!("\"{display}\""), json, "Display and serde should match for {state:?}");
            assert_eq!(display.parse::<OnboardingState>().unwrap(), state);
        }
    }

    #[test]
    fn unknown_state_fails_to_parse() {
        assert!("await_shoe_size".parse::<OnboardingState>().is_err());
    }
}
