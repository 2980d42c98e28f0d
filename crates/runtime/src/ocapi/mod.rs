//! OCAPI REST clients
//!
//! - [`DataApi`]: instance administration (sites, code versions, jobs,
//!   global preferences) with the client credentials grant.
//! - [`ShopApi`]: storefront order search for one site.
//! - [`AgentShopApi`]: order access on behalf of a Business Manager user,
//!   with the delegated grant.

mod data;
mod shop;
/// Request and response documents
pub mod types;

pub use data::DataApi;
pub use shop::{AgentShopApi, ShopApi};
