//! Channel/user mode-string walking, driven by negotiated ISUPPORT
//! `PREFIX`/`CHANMODES` rather than a hardcoded mode enum (per spec §4.4/
//! §4.6, modes are per-network, not a fixed RFC set).

mod walk;

pub use self::walk::{walk_channel_modes, walk_user_modes, ChannelModeEffect, Sign};
