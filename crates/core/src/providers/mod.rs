pub mod traits;

// Lookup service implementations
pub mod coingecko;
