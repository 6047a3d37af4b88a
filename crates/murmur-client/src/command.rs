use thiserror::Error;

use murmur_types::models::{ChannelId, MessageId};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(ChannelId),
    More,
    Reply { parent: MessageId, text: String },
    React { message_id: MessageId, emoji: String },
    Members,
    Channels,
    Show,
    Help,
    Quit,
    Say(String),
    Nothing,
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command /{0}, try /help")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
/join <channel>          switch channel
/more                    load older messages
/reply <message> <text>  reply to a message
/react <message> <emoji> toggle a reaction
/members                 list channel members
/channels                list your channels
/show                    redraw the channel
/quit                    leave
anything else is sent as a message";

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            if line.is_empty() {
                return Ok(Self::Nothing);
            }
            return Ok(Self::Say(line.to_string()));
        };

        let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let args = args.trim();
        match name {
            "join" | "j" => args
                .parse()
                .map(Self::Join)
                .map_err(|_| CommandError::Usage("/join <channel>")),
            "more" => Ok(Self::More),
            "reply" | "r" => {
                let (id, text) = split_id(args).ok_or(CommandError::Usage("/reply <message> <text>"))?;
                Ok(Self::Reply {
                    parent: id,
                    text: text.to_string(),
                })
            }
            "react" => {
                let (id, emoji) = split_id(args).ok_or(CommandError::Usage("/react <message> <emoji>"))?;
                Ok(Self::React {
                    message_id: id,
                    emoji: emoji.to_string(),
                })
            }
            "members" => Ok(Self::Members),
            "channels" => Ok(Self::Channels),
            "show" => Ok(Self::Show),
            "help" => Ok(Self::Help),
            "quit" | "q" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// `<id> <rest>` with a non-empty rest.
fn split_id(args: &str) -> Option<(MessageId, &str)> {
    let (id, rest) = args.split_once(char::is_whitespace)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    Some((id.trim_start_matches('#').parse().ok()?, rest))
}
