//! Rolling walk-forward evaluation

pub mod engine;
pub mod evaluation;
pub mod windows;

pub use engine::{WalkForwardConfig, WalkForwardEngine, WalkForwardResult, WalkForwardRow, WindowSummary};
pub use evaluation::evaluate_walkforward;
pub use windows::{generate_rolling_windows, RollingWindow, RollingWindows, WindowSpec};
