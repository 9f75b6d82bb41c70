//! CLI subcommands.

pub mod build;
pub mod deploy;
pub mod init;
pub mod serve;

use quire_static::CancelFlag;

/// Stop the build after the current step when Ctrl-C is pressed.
fn cancel_on_ctrl_c(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping the build");
            cancel.cancel();
        }
    });
}
