/// State management module
///
/// This module handles all application state, including:
/// - Shared data structures (data.rs)
/// - Preview handle lifecycle for the selections (previews.rs)
/// - Run progress as seen by the UI (view.rs)

pub mod data;
pub mod previews;
pub mod view;
