use std::fmt;

use serde::{Deserialize, Serialize};

/// Which half of the game is being launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Client,
    Server,
}

impl Side {
    /// Anything other than `"server"` is treated as the client.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("server") {
            Side::Server
        } else {
            Side::Client
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
