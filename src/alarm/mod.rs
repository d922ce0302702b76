pub mod matcher;
pub mod model;
