use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

pub fn fanout_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fanout"))
}

/// Command with an isolated config directory and no `FANOUT_*`/`RUST_LOG` leakage.
pub fn fanout_cmd(config_home: &TempDir) -> Command {
    let mut cmd = Command::new(fanout_bin());
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env("HOME", config_home.path())
        .env_remove("FANOUT_POOL_SIZE")
        .env_remove("FANOUT_TASK_LATENCY_MS")
        .env_remove("FANOUT_FAIL_FAST")
        .env_remove("RUST_LOG");
    cmd
}
