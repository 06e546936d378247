//! PFC Assist: a chat bot that onboards users, derives daily
//! protein/fat/carb targets and keeps a per-day intake ledger.

pub mod bot;
pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lookup;
pub mod nutrition;
pub mod onboarding;
pub mod routes;
pub mod store;
