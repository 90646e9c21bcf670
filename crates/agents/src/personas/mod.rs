//! Built-in marketing personas.
//!
//! Registration order matters: auto-routing ties that do not involve the
//! priority handler go to whichever handler comes first.

pub mod email;
pub mod landing;
pub mod launch;
pub mod twitter;

use crate::handler::Handler;

/// All built-in handlers in registry order: twitter, launch, landing, email.
pub fn builtin_handlers() -> Vec<Handler> {
    vec![
        twitter::handler(),
        launch::handler(),
        landing::handler(),
        email::handler(),
    ]
}
