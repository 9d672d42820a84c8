pub mod api;
pub mod counts;
pub mod metrics;
pub mod month;
pub mod records;
pub mod report;
pub mod wire;
