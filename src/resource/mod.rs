pub mod favorites;
pub mod filter;
pub mod registry;
pub mod store;
