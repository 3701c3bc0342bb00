//! Putting invite codes on the system clipboard
//!
//! arboard covers X11 and most Wayland compositors. Some Wayland sessions
//! refuse it, so the code is piped to `wl-copy` as a second attempt.

use std::io::{self, Write};
use std::process::{Command, Stdio};

use reminders_core::InviteCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable ({arboard}); wl-copy failed ({wl_copy})")]
    Unavailable {
        arboard: arboard::Error,
        wl_copy: io::Error,
    },
}

/// Copy a room's invite code so it can be pasted into a message
pub fn copy_invite_code(code: &InviteCode) -> Result<(), ClipboardError> {
    let arboard = match arboard::Clipboard::new().and_then(|mut c| c.set_text(code.as_str())) {
        Ok(()) => {
            tracing::debug!(code = %code, "Invite code copied via arboard");
            return Ok(());
        }
        Err(e) => e,
    };

    match pipe_to_wl_copy(code.as_str()) {
        Ok(()) => {
            tracing::debug!(code = %code, "Invite code copied via wl-copy");
            Ok(())
        }
        Err(wl_copy) => {
            tracing::warn!(%arboard, %wl_copy, "Could not copy invite code");
            Err(ClipboardError::Unavailable { arboard, wl_copy })
        }
    }
}

fn pipe_to_wl_copy(text: &str) -> io::Result<()> {
    let mut child = Command::new("wl-copy")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }

    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("wl-copy exited with {status}")))
    }
}
