//! Output formatting helpers.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use frontdesk::{LogoutCause, SessionEvent, SessionIdentity};

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message.
pub fn warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print the identity of the signed-in user.
pub fn identity(identity: &SessionIdentity) {
    field("User", &identity.id);
    if let Some(email) = &identity.email {
        field("Email", email);
    }
    if let Some(name) = &identity.name {
        field("Name", name);
    }
    field("Role", &identity.role);
}

/// Print one session event on a single line.
pub fn event(event: &SessionEvent) {
    match event {
        SessionEvent::Renewed { .. } => println!("{} session renewed", "RENEWED".green()),
        SessionEvent::LogoutRequired { cause } => {
            let cause = match cause {
                LogoutCause::Expired => "session expired",
                LogoutCause::Revoked => "session revoked",
                LogoutCause::SignedOut => "signed out",
            };
            println!("{} {}", "LOGOUT".red(), cause);
        }
    }
}
