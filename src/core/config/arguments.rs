use std::collections::HashMap;
use std::path::PathBuf;

use tracing::warn;

use crate::core::environment::Side;

/// Launch arguments as handed over by the host launcher.
///
/// Only `--key value` pairs and the bare `nogui` flag are understood.
#[derive(Debug, Clone)]
pub struct LaunchArguments {
    parsed: HashMap<String, String>,
    pub game_version: Option<String>,
    pub game_dir: PathBuf,
    pub access_token: Option<String>,
    pub inferred_side: Side,
    pub nogui: bool,
}

impl LaunchArguments {
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let mut parsed = HashMap::new();
        let mut unparsed = Vec::new();
        let mut nogui = false;

        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if i + 1 < args.len() && arg.starts_with("--") {
                parsed.insert(arg[2..].to_string(), args[i + 1].clone());
                i += 2;
                continue;
            }
            if arg.eq_ignore_ascii_case("nogui") {
                nogui = true;
            } else {
                unparsed.push(arg.clone());
            }
            i += 1;
        }

        if !unparsed.is_empty() {
            warn!("Found unparsed arguments: {:?}", unparsed);
        }

        let inferred_side = match parsed.get("launchTarget") {
            Some(target) if target.contains("server") => Side::Server,
            _ => Side::Client,
        };

        Self {
            game_version: parsed.get("fml.mcVersion").cloned(),
            game_dir: parsed
                .get("gameDir")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            access_token: parsed.get("accessToken").cloned(),
            inferred_side,
            nogui,
            parsed,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.parsed.get(key).map(String::as_str)
    }
}
