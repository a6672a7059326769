// Dioxus UI for the dependency graph editor
pub mod app;
pub mod components;
pub mod views;

pub use app::App;
