pub mod auth;

pub use auth::{
    ActionResult, AuthPageView, ForgotPasswordForm, LoginForm, ResetPageQuery, ResetPageView, ResetPasswordForm,
    SignupForm,
};
