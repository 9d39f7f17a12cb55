//! テンプレートのユースケース

mod command;
mod projection;
mod query;

pub use command::{
    CreateTemplate,
    DeleteTemplate,
    TemplateCommand,
    TemplateCommandHandler,
    UpdateTemplate,
};
pub use projection::TemplateProjector;
pub use query::TemplateQueryHandler;
