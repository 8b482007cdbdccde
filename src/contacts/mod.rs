// Contacts and leads
pub mod contacts_api;
pub mod lead_tier;

pub use contacts_api::*;
pub use lead_tier::LeadTier;
