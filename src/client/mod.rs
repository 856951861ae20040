//! Client side of the login and signup screens.

mod api;
mod form;

pub use api::{AuthApi, HttpAuthApi};
pub use form::{AuthForm, FormMode, SubmitOutcome, UserContext, HOME_ROUTE};
