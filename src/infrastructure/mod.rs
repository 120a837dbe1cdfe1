pub mod notifier;
pub mod receipt;
pub mod storefront;
