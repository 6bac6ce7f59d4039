//! User-facing message texts sent over the chat channel.
//!
//! Messages use Telegram's HTML parse mode, so every user-supplied fragment
//! goes through [`escape_html`].

use crate::storage::{Ticket, TicketStatus};

/// Escape the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap a ticket notice with the ticket title and short id.
pub fn ticket_notice(ticket: &Ticket, body: &str) -> String {
    format!(
        "<b>Ticket \"{}\"</b>\n\n{}\n\n<i>Ticket ID:</i> #{}",
        escape_html(&ticket.title),
        body,
        ticket.short_id()
    )
}

pub fn ticket_created() -> String {
    "Your ticket has been created and is waiting to be picked up.".to_string()
}

/// Status-change body. `handler_name` is only used for `InProgress`.
pub fn status_changed(status: TicketStatus, handler_name: Option<&str>) -> String {
    match status {
        TicketStatus::Pending => "Your ticket is waiting to be reviewed.".to_string(),
        TicketStatus::InProgress => format!(
            "Your ticket has been taken in progress by {}.",
            escape_html(handler_name.unwrap_or("support"))
        ),
        TicketStatus::Resolved => "Your ticket has been resolved.".to_string(),
        TicketStatus::Canceled => "Your ticket has been canceled.".to_string(),
    }
}

pub fn new_comment(author: &str, text: &str) -> String {
    format!(
        "New comment on your ticket from {}:\n\n\"{}\"",
        escape_html(author),
        escape_html(text)
    )
}

/// One-time credentials for an account created from the chat channel.
pub fn credentials(email: &str, password: &str) -> String {
    format!(
        "You are registered!\nYour credentials for the web console:\n\n\
         <b>Email:</b> <code>{}</code>\n<b>Password:</b> <code>{}</code>",
        escape_html(email),
        escape_html(password)
    )
}
