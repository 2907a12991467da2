pub mod config;
pub mod gesture;
pub mod logging;
pub mod math;
pub mod renderer;
pub mod ui;
