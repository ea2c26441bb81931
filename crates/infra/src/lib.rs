//! Infrastructure layer: ledger store adapters, configuration, seeding and
//! the application services built on top of them.

pub mod config;
pub mod seed;
pub mod services;
pub mod store;

#[cfg(test)]
mod test_support;
