//! Built-in carrier adapters.
//!
//! One module per carrier, plus the shared sandbox data generator. Each
//! adapter owns its tracking-number grammar and its webhook field
//! mapping; nothing outside this module knows carrier response shapes.

pub mod dhl;
pub mod fedex;
mod sandbox;
pub mod ups;
pub mod usps;

pub use dhl::DhlAdapter;
pub use fedex::FedexAdapter;
pub use ups::UpsAdapter;
pub use usps::UspsAdapter;
