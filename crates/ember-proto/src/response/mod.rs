//! IRC numeric response codes, trimmed to the replies the daemon core
//! command set (NICK, USER, PASS, PING/PONG, QUIT, JOIN, PART, NAMES,
//! TOPIC, KICK, INVITE, MODE, PRIVMSG/NOTICE, KILL, OPER, REHASH, RESTART,
//! DIE, ISON, USERHOST, AWAY) actually emits, plus their RFC 2812
//! registration companions (002-004).
//!
//! # Reference
//! - RFC 2812: Internet Relay Chat: Client Protocol
//! - Modern IRC documentation: <https://modern.ircdocs.horse/>

#![allow(non_camel_case_types)]

use std::fmt;
use std::str::FromStr;

/// IRC server response code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
#[non_exhaustive]
pub enum Response {
    /// 001 - Welcome to the IRC network.
    RPL_WELCOME = 1,
    /// 002 - Your host is running version.
    RPL_YOURHOST = 2,
    /// 003 - Server creation date.
    RPL_CREATED = 3,
    /// 004 - Server info (name, version, user modes, channel modes).
    RPL_MYINFO = 4,
    /// 005 - Server supported features (ISUPPORT).
    RPL_ISUPPORT = 5,

    /// 221 - User mode string.
    RPL_UMODEIS = 221,

    /// 232 - RULES text.
    RPL_RULES = 232,

    /// 301 - User is away.
    RPL_AWAY = 301,
    /// 302 - USERHOST reply.
    RPL_USERHOST = 302,
    /// 303 - ISON reply.
    RPL_ISON = 303,
    /// 305 - You are no longer marked as away.
    RPL_UNAWAY = 305,
    /// 306 - You have been marked as away.
    RPL_NOWAWAY = 306,
    /// 308 - Start of RULES.
    RPL_RULESSTART = 308,
    /// 309 - End of RULES.
    RPL_RULESEND = 309,

    /// 324 - Channel mode.
    RPL_CHANNELMODEIS = 324,
    /// 329 - Channel creation time.
    RPL_CREATIONTIME = 329,
    /// 331 - No topic set.
    RPL_NOTOPIC = 331,
    /// 332 - Channel topic.
    RPL_TOPIC = 332,
    /// 333 - Topic set by/time.
    RPL_TOPICWHOTIME = 333,
    /// 341 - Inviting user to channel.
    RPL_INVITING = 341,
    /// 346 - Invite-exception list entry.
    RPL_INVITELIST = 346,
    /// 347 - End of invite-exception list.
    RPL_ENDOFINVITELIST = 347,
    /// 348 - Ban-exception list entry.
    RPL_EXCEPTLIST = 348,
    /// 349 - End of ban-exception list.
    RPL_ENDOFEXCEPTLIST = 349,

    /// 353 - NAMES reply.
    RPL_NAMREPLY = 353,
    /// 366 - End of NAMES.
    RPL_ENDOFNAMES = 366,
    /// 367 - Ban list entry.
    RPL_BANLIST = 367,
    /// 368 - End of ban list.
    RPL_ENDOFBANLIST = 368,

    /// 372 - MOTD text.
    RPL_MOTD = 372,
    /// 375 - MOTD start.
    RPL_MOTDSTART = 375,
    /// 376 - End of MOTD.
    RPL_ENDOFMOTD = 376,

    /// 381 - You are now an operator.
    RPL_YOUREOPER = 381,
    /// 382 - Rehashing config.
    RPL_REHASHING = 382,

    /// 400 - Unknown error.
    ERR_UNKNOWNERROR = 400,
    /// 401 - No such nick.
    ERR_NOSUCHNICK = 401,
    /// 403 - No such channel.
    ERR_NOSUCHCHANNEL = 403,
    /// 404 - Cannot send to channel.
    ERR_CANNOTSENDTOCHAN = 404,
    /// 405 - Too many channels.
    ERR_TOOMANYCHANNELS = 405,
    /// 409 - No origin.
    ERR_NOORIGIN = 409,
    /// 411 - No recipient given.
    ERR_NORECIPIENT = 411,
    /// 412 - No text to send.
    ERR_NOTEXTTOSEND = 412,
    /// 421 - Unknown command.
    ERR_UNKNOWNCOMMAND = 421,
    /// 422 - No MOTD.
    ERR_NOMOTD = 422,
    /// 431 - No nickname given.
    ERR_NONICKNAMEGIVEN = 431,
    /// 432 - Erroneous nickname.
    ERR_ERRONEOUSNICKNAME = 432,
    /// 433 - Nickname in use.
    ERR_NICKNAMEINUSE = 433,
    /// 441 - User not in channel.
    ERR_USERNOTINCHANNEL = 441,
    /// 442 - Not on channel.
    ERR_NOTONCHANNEL = 442,
    /// 443 - User already on channel.
    ERR_USERONCHANNEL = 443,
    /// 451 - Not registered.
    ERR_NOTREGISTERED = 451,
    /// 461 - Need more params.
    ERR_NEEDMOREPARAMS = 461,
    /// 462 - Already registered.
    ERR_ALREADYREGISTERED = 462,
    /// 464 - Password mismatch.
    ERR_PASSWDMISMATCH = 464,
    /// 467 - Key already set.
    ERR_KEYSET = 467,
    /// 471 - Channel is full.
    ERR_CHANNELISFULL = 471,
    /// 472 - Unknown mode.
    ERR_UNKNOWNMODE = 472,
    /// 473 - Invite-only channel.
    ERR_INVITEONLYCHAN = 473,
    /// 474 - Banned from channel.
    ERR_BANNEDFROMCHAN = 474,
    /// 475 - Bad channel key.
    ERR_BADCHANNELKEY = 475,
    /// 476 - Bad channel mask.
    ERR_BADCHANMASK = 476,
    /// 481 - No privileges.
    ERR_NOPRIVILEGES = 481,
    /// 482 - Channel op privileges needed.
    ERR_CHANOPRIVSNEEDED = 482,
    /// 483 - Cannot kill a server.
    ERR_CANTKILLSERVER = 483,
    /// 491 - No O-line for your host.
    ERR_NOOPERHOST = 491,
    /// 501 - Unknown user mode flag.
    ERR_UMODEUNKNOWNFLAG = 501,
    /// 502 - Cannot change mode for other users.
    ERR_USERSDONTMATCH = 502,
}

impl Response {
    /// The numeric code as `u16`.
    #[inline]
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Look up a response by its numeric code.
    pub fn from_code(code: u16) -> Option<Response> {
        use Response::*;
        Some(match code {
            1 => RPL_WELCOME,
            2 => RPL_YOURHOST,
            3 => RPL_CREATED,
            4 => RPL_MYINFO,
            5 => RPL_ISUPPORT,
            221 => RPL_UMODEIS,
            232 => RPL_RULES,
            301 => RPL_AWAY,
            302 => RPL_USERHOST,
            303 => RPL_ISON,
            305 => RPL_UNAWAY,
            306 => RPL_NOWAWAY,
            308 => RPL_RULESSTART,
            309 => RPL_RULESEND,
            324 => RPL_CHANNELMODEIS,
            329 => RPL_CREATIONTIME,
            331 => RPL_NOTOPIC,
            332 => RPL_TOPIC,
            333 => RPL_TOPICWHOTIME,
            341 => RPL_INVITING,
            346 => RPL_INVITELIST,
            347 => RPL_ENDOFINVITELIST,
            348 => RPL_EXCEPTLIST,
            349 => RPL_ENDOFEXCEPTLIST,
            353 => RPL_NAMREPLY,
            366 => RPL_ENDOFNAMES,
            367 => RPL_BANLIST,
            368 => RPL_ENDOFBANLIST,
            372 => RPL_MOTD,
            375 => RPL_MOTDSTART,
            376 => RPL_ENDOFMOTD,
            381 => RPL_YOUREOPER,
            382 => RPL_REHASHING,
            400 => ERR_UNKNOWNERROR,
            401 => ERR_NOSUCHNICK,
            403 => ERR_NOSUCHCHANNEL,
            404 => ERR_CANNOTSENDTOCHAN,
            405 => ERR_TOOMANYCHANNELS,
            409 => ERR_NOORIGIN,
            411 => ERR_NORECIPIENT,
            412 => ERR_NOTEXTTOSEND,
            421 => ERR_UNKNOWNCOMMAND,
            422 => ERR_NOMOTD,
            431 => ERR_NONICKNAMEGIVEN,
            432 => ERR_ERRONEOUSNICKNAME,
            433 => ERR_NICKNAMEINUSE,
            441 => ERR_USERNOTINCHANNEL,
            442 => ERR_NOTONCHANNEL,
            443 => ERR_USERONCHANNEL,
            451 => ERR_NOTREGISTERED,
            461 => ERR_NEEDMOREPARAMS,
            462 => ERR_ALREADYREGISTERED,
            464 => ERR_PASSWDMISMATCH,
            467 => ERR_KEYSET,
            471 => ERR_CHANNELISFULL,
            472 => ERR_UNKNOWNMODE,
            473 => ERR_INVITEONLYCHAN,
            474 => ERR_BANNEDFROMCHAN,
            475 => ERR_BADCHANNELKEY,
            476 => ERR_BADCHANMASK,
            481 => ERR_NOPRIVILEGES,
            482 => ERR_CHANOPRIVSNEEDED,
            483 => ERR_CANTKILLSERVER,
            491 => ERR_NOOPERHOST,
            501 => ERR_UMODEUNKNOWNFLAG,
            502 => ERR_USERSDONTMATCH,
            _ => return None,
        })
    }

    /// Whether this is an error reply (400-599 by convention).
    #[inline]
    pub fn is_error(&self) -> bool {
        (400..600).contains(&self.code())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.code())
    }
}

/// Error returned when a string doesn't parse as a known three-digit
/// numeric.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown response code: {0}")]
pub struct ParseResponseError(pub String);

impl FromStr for Response {
    type Err = ParseResponseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>()
            .ok()
            .and_then(Response::from_code)
            .ok_or_else(|| ParseResponseError(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips() {
        assert_eq!(Response::RPL_WELCOME.code(), 1);
        assert_eq!(Response::from_code(1), Some(Response::RPL_WELCOME));
        assert_eq!(Response::ERR_NICKNAMEINUSE.code(), 433);
        assert_eq!(Response::from_code(433), Some(Response::ERR_NICKNAMEINUSE));
    }

    #[test]
    fn unknown_code_is_none() {
        assert_eq!(Response::from_code(999), None);
    }

    #[test]
    fn is_error_classifies_4xx_5xx() {
        assert!(!Response::RPL_WELCOME.is_error());
        assert!(Response::ERR_NICKNAMEINUSE.is_error());
        assert!(Response::ERR_USERSDONTMATCH.is_error());
    }

    #[test]
    fn parses_from_wire_numeric_string() {
        assert_eq!("001".parse::<Response>().unwrap(), Response::RPL_WELCOME);
        assert_eq!(
            "433".parse::<Response>().unwrap(),
            Response::ERR_NICKNAMEINUSE
        );
        assert!("abc".parse::<Response>().is_err());
    }

    #[test]
    fn displays_as_zero_padded_three_digits() {
        assert_eq!(format!("{}", Response::RPL_WELCOME), "001");
        assert_eq!(format!("{}", Response::ERR_NICKNAMEINUSE), "433");
    }
}
