pub mod analytics;
pub mod chart;
pub mod coin;
pub mod edit;
pub mod record;
pub mod session;
pub mod settings;
