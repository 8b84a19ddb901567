//! Client-side advisor
//!
//! Ranking and scoring are pure functions in [`ranking`]. UI state is one
//! [`view::AdvisorView`] changed only by its reducer, with a
//! [`disclosure::ZoneCard`] per zone. [`session::AdvisorSession`] drives the
//! reducer against a backend reached through [`client::AdvisorClient`].

pub mod client;
pub mod disclosure;
pub mod ranking;
pub mod session;
pub mod view;

pub use client::{AdvisorBackend, AdvisorClient};
pub use disclosure::{CardEffect, CardEvent, CardPhase, TimerSequence, ZoneCard};
pub use ranking::{ScoreBand, ZoneSortKey, combined_score};
pub use session::AdvisorSession;
pub use view::{AdvisorView, ForecastWindow, Tab, ViewAction, ViewEffect};
