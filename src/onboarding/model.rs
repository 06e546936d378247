//! User profile model and the typed patch used to update it.

use serde::{Deserialize, Serialize};

use super::state::OnboardingState;

/// Biological sex used by the BMR formula.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

/// Self-reported daily activity level.
///
/// `Unknown` is only produced when a stored value cannot be decoded; the goal
/// calculator treats it like `Mid`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Low,
    Mid,
    High,
    #[serde(other)]
    Unknown,
}

impl Activity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
            Self::Unknown => "unknown",
        }
    }

    /// Decode a stored value, falling back to `Unknown`.
    pub fn from_stored(s: &str) -> Self {
        match s {
            "low" => Self::Low,
            "mid" => Self::Mid,
            "high" => Self::High,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A discrete choice made by pressing a button rather than typing.
///
/// Decoded once at the transport boundary (see `channels::payload`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Gender(Gender),
    Activity(Activity),
}

/// Daily macro targets.
///
/// `carb_g` is signed: at extreme inputs protein and fat can already exceed
/// the calorie budget and the remainder goes negative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Goals {
    #[serde(rename = "cal")]
    pub calories: i64,
    #[serde(rename = "protein")]
    pub protein_g: i64,
    #[serde(rename = "fat")]
    pub fat_g: i64,
    #[serde(rename = "carb")]
    pub carb_g: i64,
}

/// Durable per-user record driving onboarding and goal lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub state: OnboardingState,
    pub gender: Option<Gender>,
    pub activity: Option<Activity>,
    pub age: Option<u32>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub goals: Option<Goals>,
}

impl UserProfile {
    /// A blank profile in the given state.
    pub fn new(user_id: impl Into<String>, state: OnboardingState) -> Self {
        Self {
            user_id: user_id.into(),
            state,
            gender: None,
            activity: None,
            age: None,
            weight: None,
            height: None,
            goals: None,
        }
    }

    /// Whether onboarding has completed.
    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    /// Human-readable names of the fields still needed to compute goals.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.gender.is_none() {
            missing.push("sex");
        }
        if self.activity.is_none() {
            missing.push("activity level");
        }
        if self.age.is_none() {
            missing.push("age");
        }
        if self.weight.is_none() {
            missing.push("weight");
        }
        if self.height.is_none() {
            missing.push("height");
        }
        missing
    }

    /// Apply a patch in memory, following the rules the store applies in SQL.
    #[cfg(test)]
    pub(crate) fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(state) = patch.state {
            self.state = state;
        }
        patch.gender.apply_to(&mut self.gender);
        patch.activity.apply_to(&mut self.activity);
        patch.age.apply_to(&mut self.age);
        patch.weight.apply_to(&mut self.weight);
        patch.height.apply_to(&mut self.height);
        patch.goals.apply_to(&mut self.goals);
    }
}

/// What to do with a single optional profile field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T: Copy> FieldUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// The value to write, or `None` for `Clear`. Meaningless for `Keep`.
    pub fn value(&self) -> Option<T> {
        match self {
            Self::Set(v) => Some(*v),
            Self::Keep | Self::Clear => None,
        }
    }

    #[cfg(test)]
    fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Set(v) => *slot = Some(*v),
            Self::Clear => *slot = None,
        }
    }
}

/// A partial update of a `UserProfile`, consumed by
/// `Database::apply_profile_patch`. Only touched fields are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub state: Option<OnboardingState>,
    pub gender: FieldUpdate<Gender>,
    pub activity: FieldUpdate<Activity>,
    pub age: FieldUpdate<u32>,
    pub weight: FieldUpdate<f64>,
    pub height: FieldUpdate<f64>,
    pub goals: FieldUpdate<Goals>,
}

impl ProfilePatch {
    /// Only move the state machine.
    pub fn state(state: OnboardingState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    /// Clear every collected field and go back to the first question.
    pub fn reset() -> Self {
        Self {
            state: Some(OnboardingState::AwaitGender),
            gender: FieldUpdate::Clear,
            activity: FieldUpdate::Clear,
            age: FieldUpdate::Clear,
            weight: FieldUpdate::Clear,
            height: FieldUpdate::Clear,
            goals: FieldUpdate::Clear,
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = FieldUpdate::Set(gender);
        self
    }

    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activity = FieldUpdate::Set(activity);
        self
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = FieldUpdate::Set(age);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = FieldUpdate::Set(weight);
        self
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = FieldUpdate::Set(height);
        self
    }

    pub fn with_goals(mut self, goals: Goals) -> Self {
        self.goals = FieldUpdate::Set(goals);
        self
    }

    /// True when the patch writes nothing.
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.gender.is_keep()
            && self.activity.is_keep()
            && self.age.is_keep()
            && self.weight.is_keep()
            && self.height.is_keep()
            && self.goals.is_keep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_profile() -> UserProfile {
        UserProfile {
            user_id: "u1".to_string(),
            state: OnboardingState::Done,
            gender: Some(Gender::Female),
            activity: Some(Activity::High),
            age: Some(31),
            weight: Some(58.5),
            height: Some(162.0),
            goals: Some(Goals {
                calories: 2300,
                protein_g: 105,
                fat_g: 64,
                carb_g: 326,
            }),
        }
    }

    #[test]
    fn missing_fields_lists_unset_in_order() {
        let mut p = UserProfile::new("u1", OnboardingState::AwaitHeight);
        p.activity = Some(Activity::Low);
        p.weight = Some(70.0);
        assert_eq!(p.missing_fields(), vec!["sex", "age", "height"]);
        assert!(complete_profile().missing_fields().is_empty());
    }

    #[test]
    fn reset_patch_clears_everything() {
        let mut p = complete_profile();
        p.apply(&ProfilePatch::reset());
        assert_eq!(p, UserProfile::new("u1", OnboardingState::AwaitGender));
    }

    #[test]
    fn keep_leaves_fields_untouched() {
        let mut p = complete_profile();
        p.apply(&ProfilePatch::default().with_age(40));
        assert_eq!(p.age, Some(40));
        assert_eq!(p.weight, Some(58.5));
        assert_eq!(p.state, OnboardingState::Done);
    }

    #[test]
    fn empty_patch_detection() {
        assert!(ProfilePatch::default().is_empty());
        assert!(!ProfilePatch::state(OnboardingState::AwaitAge).is_empty());
        assert!(!ProfilePatch::default().with_weight(1.0).is_empty());
    }

    #[test]
    fn goals_use_compact_json_keys() {
        let goals = complete_profile().goals.unwrap();
        let json = serde_json::to_value(goals).unwrap();
        assert_eq!(json["cal"], 2300);
        assert_eq!(json["carb"], 326);
        let parsed: Goals = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, goals);
    }

    #[test]
    fn unknown_activity_decodes_to_fallback() {
        assert_eq!(Activity::from_stored("mid"), Activity::Mid);
        assert_eq!(Activity::from_stored("extreme"), Activity::Unknown);
        let parsed: Activity = serde_json::from_str("\"couch\"").unwrap();
        assert_eq!(parsed, Activity::Unknown);
    }

    #[test]
    fn gender_parse() {
        assert_eq!("male".parse::<Gender>(), Ok(Gender::Male));
        assert!("other".parse::<Gender>().is_err());
    }
}
