//! Command registration (spec §4.8).
//!
//! A reflection/attribute-driven command table (the kind older bot
//! frameworks build with per-method annotations) has no counterpart in a
//! statically-typed language without giving up compile-time checking, so
//! commands are registered explicitly through [`CommandRegistry::register`]
//! instead, building the same `name → {parameter schema, handler}` table an
//! attribute scan would have produced.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::DispatchError;

use super::dispatcher::CommandContext;

/// How one positional parameter is bound from the command's argument tokens.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamKind {
    /// The matched command verb itself, not consumed from the argument list.
    CommandName,
    /// Everything remaining, joined back with single spaces.
    Rest,
    /// One whitespace-delimited token parsed as a number; `0` if the token
    /// doesn't parse (the token is left unconsumed for the next parameter).
    Number,
    /// Consume whitespace-delimited tokens greedily for as long as they
    /// parse as the element type (here: always succeeds, so this should be
    /// the last parameter in a spec).
    Array,
    /// One whitespace-delimited token taken verbatim.
    Text,
}

/// A single parameter in a [`CommandSpec`].
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    /// Inclusive bounds checked after binding, for [`ParamKind::Number`].
    pub range: Option<(f64, f64)>,
}

impl ParamSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            range: None,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[must_use]
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// A value bound to one [`ParamSpec`] and handed to the command handler.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundValue {
    CommandName(String),
    Text(String),
    Number(f64),
    Array(Vec<String>),
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Option<String>, DispatchError>> + Send>>;

/// A registered command's handler. Boxes the future rather than using
/// `async fn` in a trait to keep the crate's stated MSRV.
pub trait Handler: Send + Sync {
    fn call(&self, ctx: CommandContext, args: Vec<BoundValue>) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(CommandContext, Vec<BoundValue>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<String>, DispatchError>> + Send + 'static,
{
    fn call(&self, ctx: CommandContext, args: Vec<BoundValue>) -> HandlerFuture {
        Box::pin(self(ctx, args))
    }
}

/// One registered command: its parameter schema, required permission (if
/// any), and handler.
pub struct CommandSpec {
    pub params: Vec<ParamSpec>,
    pub permission: Option<String>,
    pub handler: Box<dyn Handler>,
}

/// Builder for one [`CommandSpec`], registered by [`CommandRegistry::command`].
pub struct CommandBuilder {
    params: Vec<ParamSpec>,
    permission: Option<String>,
}

impl CommandBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            permission: None,
        }
    }

    #[must_use]
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    #[must_use]
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    #[must_use]
    pub fn build(self, handler: impl Handler + 'static) -> CommandSpec {
        CommandSpec {
            params: self.params,
            permission: self.permission,
            handler: Box::new(handler),
        }
    }
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The full command table a [`super::dispatcher::Dispatcher`] consults,
/// keyed by verb (case-insensitively — stored upper-cased).
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandSpec>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl AsRef<str>, spec: CommandSpec) -> &mut Self {
        self.commands.insert(name.as_ref().to_ascii_uppercase(), spec);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(&name.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup_is_case_insensitive() {
        let mut registry = CommandRegistry::new();
        registry.register(
            "ping",
            CommandBuilder::new().build(|_ctx, _args| async { Ok(Some("pong".to_string())) }),
        );
        assert!(registry.get("PING").is_some());
        assert!(registry.get("ping").is_some());
        assert!(registry.get("pong").is_none());
    }
}
