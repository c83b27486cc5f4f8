pub mod aggregator;
pub mod chart_service;
pub mod edit_service;
pub mod sync_service;
