//! Chat command parsing and replies.
//!
//! Replies are computed here without touching the transport so they can be
//! tested against an in-memory helpdesk.

use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::notifications::telegram::{IncomingMessage, TelegramUser};
use crate::notifications::templates::escape_html;
use crate::service::link_svc::DEEP_LINK_PREFIX;
use crate::service::ticket_svc::{DESCRIPTION_MIN_CHARS, TITLE_MAX_CHARS};
use crate::service::{ChannelProfile, Helpdesk};

/// How many tickets `/tickets` lists.
pub const RECENT_TICKETS: u32 = 5;

const HELP: &str = "Commands:\n\
    /start - start working with the bot\n\
    /help - show this message\n\
    /tickets - show your latest tickets\n\n\
    To open a new ticket, just send me a message describing the problem.";

const NOT_LINKED: &str = "Your Telegram account is not linked yet. \
    Sign in through the web console and link it from your profile.";

const FAILURE: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand<'a> {
    /// `/start`, optionally with a deep-link payload.
    Start { payload: Option<&'a str> },
    Help,
    Tickets,
    /// Any other command.
    Unknown(&'a str),
}

impl<'a> BotCommand<'a> {
    /// Parse a message text. Returns `None` for plain text.
    ///
    /// Accepts the `/cmd@botname` form used in group chats.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (head, args) = rest
            .split_once(char::is_whitespace)
            .map_or((rest, ""), |(h, a)| (h, a.trim()));
        let name = head.split_once('@').map_or(head, |(n, _)| n);

        Some(match name {
            "start" => Self::Start {
                payload: (!args.is_empty()).then_some(args),
            },
            "help" => Self::Help,
            "tickets" => Self::Tickets,
            other => Self::Unknown(other),
        })
    }
}

impl From<&TelegramUser> for ChannelProfile {
    fn from(user: &TelegramUser) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    }
}

/// Compute the reply to an incoming message, if any.
pub async fn respond(helpdesk: &Helpdesk, message: &IncomingMessage) -> Option<String> {
    let text = message.text.as_deref()?;
    let channel_id = message
        .from
        .as_ref()
        .map_or(message.chat.id, |u| u.id)
        .to_string();
    let profile = message
        .from
        .as_ref()
        .map(ChannelProfile::from)
        .unwrap_or_default();

    let Some(command) = BotCommand::parse(text) else {
        return Some(open_ticket(helpdesk, &channel_id, text).await);
    };
    debug!(?command, "Bot command received");

    let reply = match command {
        BotCommand::Start { payload } => {
            match payload.and_then(|p| p.strip_prefix(DEEP_LINK_PREFIX)) {
                Some(token) => redeem(helpdesk, token, &channel_id, &profile).await,
                None => greeting(&profile),
            }
        }
        BotCommand::Help => HELP.to_string(),
        BotCommand::Tickets => recent_tickets(helpdesk, &channel_id).await,
        BotCommand::Unknown(_) => format!("Unknown command.\n\n{HELP}"),
    };
    Some(reply)
}

fn greeting(profile: &ChannelProfile) -> String {
    let name = if profile.first_name.trim().is_empty() {
        "there"
    } else {
        profile.first_name.trim()
    };
    format!(
        "Hello, {}! 👋\n\nI am the helpdesk bot.\n\n{HELP}",
        escape_html(name)
    )
}

async fn redeem(
    helpdesk: &Helpdesk,
    token: &str,
    channel_id: &str,
    profile: &ChannelProfile,
) -> String {
    match helpdesk
        .redeem_link_token(token, channel_id, profile)
        .await
    {
        Ok(r) if r.created => "✅ You are registered! Your sign-in credentials follow in a \
                               separate message."
            .to_string(),
        Ok(r) => format!(
            "✅ Your Telegram account is now linked to {}.\n\n\
             You can use the bot to follow your tickets.",
            escape_html(&r.user.email)
        ),
        Err(ServiceError::InvalidToken) => "❌ This link is invalid or has expired.".to_string(),
        Err(ServiceError::ChannelAlreadyLinked) => {
            "❌ This Telegram account is already linked to another user.".to_string()
        }
        Err(ServiceError::NotFound(_)) => "❌ User not found.".to_string(),
        Err(e) => {
            warn!(error = %e, "Link token redemption failed");
            format!("❌ {FAILURE}")
        }
    }
}

async fn recent_tickets(helpdesk: &Helpdesk, channel_id: &str) -> String {
    let user = match helpdesk.accounts().find_by_channel(channel_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return NOT_LINKED.to_string(),
        Err(_) => return FAILURE.to_string(),
    };

    let tickets = match helpdesk
        .tickets()
        .list_recent_for_user(&user.id, RECENT_TICKETS)
        .await
    {
        Ok(tickets) => tickets,
        Err(_) => return FAILURE.to_string(),
    };

    if tickets.is_empty() {
        return "You have no tickets yet. Send me a message to open one.".to_string();
    }

    let mut reply = String::from("Your latest tickets:\n");
    for ticket in &tickets {
        reply.push_str(&format!(
            "\n{} <b>{}</b> #{}",
            ticket.status.marker(),
            escape_html(&ticket.title),
            ticket.short_id()
        ));
    }
    reply
}

/// Title given to tickets opened from a chat message.
fn chat_ticket_title(name: &str) -> String {
    format!("Ticket from {name}")
        .chars()
        .take(TITLE_MAX_CHARS)
        .collect()
}

/// Plain text from a linked user opens a ticket with the text as description.
async fn open_ticket(helpdesk: &Helpdesk, channel_id: &str, text: &str) -> String {
    let user = match helpdesk.accounts().find_by_channel(channel_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return NOT_LINKED.to_string(),
        Err(_) => return FAILURE.to_string(),
    };

    let result = helpdesk
        .tickets()
        .create(&user.id, &chat_ticket_title(&user.name), text.trim(), None)
        .await;
    match result {
        Ok(ticket) => format!(
            "Ticket #{} opened. Follow its status with /tickets.",
            ticket.short_id()
        ),
        Err(ServiceError::Validation(_)) => format!(
            "Please describe the problem in at least {DESCRIPTION_MIN_CHARS} characters."
        ),
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "Ticket from chat failed");
            FAILURE.to_string()
        }
    }
}
