//! Data models for the history chart
//!
//! `history` holds what travels over the wire and what the user typed,
//! `chart` holds what the canvas draws.

pub mod chart;
pub mod history;
