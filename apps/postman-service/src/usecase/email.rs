//! メールのユースケース

mod command;
mod projection;
mod query;

pub use command::{CreateEmail, DeleteEmail, EmailCommand, EmailCommandHandler, ResendEmail};
pub use projection::EmailProjector;
pub use query::EmailQueryHandler;
