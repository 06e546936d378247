//! Onboarding: the questionnaire that collects body metrics and produces
//! daily goals. Runs until the profile reaches `Done`.

pub mod machine;
pub mod model;
pub mod prompts;
pub mod state;

pub use machine::{OnboardingMachine, Step};
pub use model::{Activity, Gender, Goals, ProfilePatch, Selection, UserProfile};
pub use state::OnboardingState;
