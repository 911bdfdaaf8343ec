//! JID (Jabber ID) type used to address users and devices.
//!
//! A multi-device JID carries an agent and a device slot next to the user:
//! `user.agent:device@server`. The resume-mode login payload is built from
//! the split parts of the stored self JID.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Known JID servers.
pub mod servers {
    pub const DEFAULT_USER: &str = "s.whatsapp.net";
    pub const GROUP: &str = "g.us";
    pub const LEGACY_USER: &str = "c.us";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Jid {
    pub user: String,
    pub agent: u8,
    pub device: u16,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
            ..Default::default()
        }
    }

    /// The four components used by the login payload builder.
    pub fn split(&self) -> (&str, u8, u16, &str) {
        (&self.user, self.agent, self.device, &self.server)
    }

    /// `user@server` without the agent/device qualifiers.
    pub fn to_non_ad(&self) -> Jid {
        Jid::new(self.user.clone(), self.server.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.server.is_empty()
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.agent > 0 {
            write!(f, "{}.{}:{}@{}", self.user, self.agent, self.device, self.server)
        } else if self.device > 0 {
            write!(f, "{}:{}@{}", self.user, self.device, self.server)
        } else if !self.user.is_empty() {
            write!(f, "{}@{}", self.user, self.server)
        } else {
            write!(f, "{}", self.server)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse JID: {0}")]
pub struct ParseJidError(pub String);

impl FromStr for Jid {
    type Err = ParseJidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user_part, server) = match s.split_once('@') {
            Some((u, srv)) => (u, srv),
            None => return Ok(Jid::new("", s)),
        };

        let mut jid = Jid::new("", server);

        // user[.agent][:device]
        let (user, rest) = match user_part.split_once('.') {
            Some((u, rest)) => (u, Some(rest)),
            None => match user_part.split_once(':') {
                Some((u, device)) => {
                    jid.device = device
                        .parse()
                        .map_err(|_| ParseJidError(format!("bad device in {s:?}")))?;
                    (u, None)
                }
                None => (user_part, None),
            },
        };
        jid.user = user.to_string();

        if let Some(rest) = rest {
            let (agent, device) = match rest.split_once(':') {
                Some((a, d)) => (a, Some(d)),
                None => (rest, None),
            };
            jid.agent = agent
                .parse()
                .map_err(|_| ParseJidError(format!("bad agent in {s:?}")))?;
            if let Some(device) = device {
                jid.device = device
                    .parse()
                    .map_err(|_| ParseJidError(format!("bad device in {s:?}")))?;
            }
        }

        Ok(jid)
    }
}

lazy_static::lazy_static! {
    pub static ref SERVER_JID: Jid = Jid::new("", servers::DEFAULT_USER);
    pub static ref LEGACY_SERVER_JID: Jid = Jid::new("", servers::LEGACY_USER);
}
