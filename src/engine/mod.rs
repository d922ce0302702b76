pub mod scale;
pub mod stopwatch;
