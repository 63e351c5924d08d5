//! Ways of contacting the organisation.

use diesel::result::Error as DbError;

pub mod address;
pub mod email;
pub mod phone;
pub mod social;

pub use self::{
    address::{PhysicalAddress, PhysicalAddressData},
    email::{EmailAddress, EmailAddressData},
    phone::{PhoneNumber, PhoneNumberData},
    social::{SocialMediaLink, SocialMediaLinkData},
};

fn default_true() -> bool {
    true
}

#[derive(ApiError, Debug, Fail)]
pub enum FindContactError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "No such contact")]
    #[api(code = "contact:not-found", status = "NOT_FOUND")]
    NotFound,
}

impl_from! { for FindContactError ;
    DbError => |e| FindContactError::Internal(e),
}
