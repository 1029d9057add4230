//! A small echo bot built on [`BotRuntime`].
//!
//! Connects to a single network, joins one channel, and answers `!echo` and
//! `!ping` commands from the channel. Demonstrates the wiring spec §4.9
//! describes: a [`CommandRegistry`] built by hand, dropped into a
//! [`Dispatcher`], handed to [`BotRuntime::connect`] as an extra listener so
//! it runs inside the engine's own message loop.

use std::collections::HashMap;

use netwolf_client::bot::{
    BotRuntime, BoundValue, CommandBuilder, CommandRegistry, Dispatcher, ParamKind, ParamSpec, PermissionManager,
};
use netwolf_client::config::{ChannelEntry, NetworkConfig, ServerEntry};

fn build_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register(
        "ping",
        CommandBuilder::new().build(|_ctx, _args| async move { Ok(Some("pong".to_string())) }),
    );

    registry.register(
        "echo",
        CommandBuilder::new()
            .param(ParamSpec::new("text", ParamKind::Rest))
            .build(|_ctx, args| async move {
                let BoundValue::Text(text) = &args[0] else {
                    unreachable!("Rest always binds Text")
                };
                Ok(Some(text.clone()))
            }),
    );

    registry
}

fn example_config() -> NetworkConfig {
    NetworkConfig {
        servers: vec![ServerEntry {
            host: "irc.libera.chat".to_string(),
            port: 6697,
            tls: None,
        }],
        primary_nick: "netwolf-example".to_string(),
        secondary_nick: Some("netwolf-example_".to_string()),
        ident: "netwolf".to_string(),
        real_name: "netwolf-client example bot".to_string(),
        server_password: None,
        account_name: None,
        account_password: None,
        account_certificate_file: None,
        account_certificate_password: None,
        auth_type: Default::default(),
        disabled_sasl_mechs: Vec::new(),
        abort_on_sasl_failure: false,
        connect_timeout: std::time::Duration::from_secs(10),
        connect_retries: 3,
        ping_interval: std::time::Duration::from_secs(90),
        ping_timeout: std::time::Duration::from_secs(30),
        accept_all_certificates: false,
        trusted_fingerprints: Vec::new(),
        check_online_revocation: false,
        bind_host: None,
        use_cprivmsg: false,
        channels: vec![ChannelEntry::parse("#netwolf-example")],
        oper_name: None,
        oper_password: None,
        challenge_key_file: None,
        challenge_key_password: None,
        service_oper_password: None,
        service_oper_command: None,
        join_timeout: std::time::Duration::from_millis(8000),
        command_prefix: "!".to_string(),
        rate_limiter: Default::default(),
        permissions: HashMap::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = example_config();
    let dispatcher = Dispatcher::new(build_registry(), PermissionManager::default(), config.command_prefix.clone());

    let runtime = BotRuntime::connect(config, false, vec![Box::new(dispatcher)]).await?;
    tracing::info!("connected and joined configured channels");

    // Block until the engine's message loop ends (disconnect, error, or a
    // future `handle.disconnect()` call from elsewhere in the process).
    let outcome = runtime.engine_task.await?;
    tracing::info!(?outcome, "engine loop finished");

    Ok(())
}
