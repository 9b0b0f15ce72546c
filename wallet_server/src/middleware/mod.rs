mod acl;
mod hmac;
mod principal;

pub use acl::{AccessRule, AclMiddlewareFactory, AclMiddlewareService};
pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService};
pub use principal::{PrincipalMiddlewareFactory, PrincipalMiddlewareService, API_KEY_HEADER};
