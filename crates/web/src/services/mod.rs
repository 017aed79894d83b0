//! Business logic shared by the page and API routes.
//!
//! # Services
//!
//! - `pets` - Create/read/update/delete/search operations, each implemented once
//! - `avatar` - Resize uploaded images and store the derived versions
//! - `storage` - Object storage (S3) for avatar images
//! - `payments` - Stripe charges
//! - `email` - Mailgun notifications
//! - `purchase` - Lookup, charge, notify

pub mod avatar;
pub mod email;
pub mod payments;
pub mod pets;
pub mod purchase;
pub mod storage;
