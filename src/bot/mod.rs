//! Bot command dispatch and runtime (spec §4.8/§4.9), built on top of
//! [`crate::engine`].

pub mod dispatcher;
pub mod registry;
pub mod runtime;

pub use dispatcher::{CommandContext, Dispatcher, PermissionManager};
pub use registry::{BoundValue, CommandBuilder, CommandRegistry, CommandSpec, Handler, ParamKind, ParamSpec};
pub use runtime::BotRuntime;
