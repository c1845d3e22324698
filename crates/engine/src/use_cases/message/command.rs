//! Chat command parsing.

use std::str::FromStr;

use chatgm_domain::AdvantageMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateArgs {
    Auto,
    Manual {
        name: String,
        race: String,
        class: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Create(CreateArgs),
    Status,
    Roll { expression: String, mode: AdvantageMode },
    Mode(String),
    Help,
    /// Known command with missing or malformed arguments.
    Usage(&'static str),
    Unknown(String),
}

pub const CREATE_USAGE: &str = "Usage: /create auto, or /create <name> <race> <class>\nExample: /create Aria Moonwhisper elf wizard";
pub const ROLL_USAGE: &str = "Usage: /roll <dice> [adv|dis]\nExamples: /roll 1d20, /roll 2d6+3, /roll d20+5 adv";
pub const MODE_USAGE: &str = "Usage: /mode <active|paused|combat|exploration|social>";

impl Command {
    /// `None` when `text` is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default();
        // "/roll@SomeBot" style mentions
        let name = name.split('@').next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = words.collect();

        let command = match name.as_str() {
            "start" => Self::Start,
            "create" => Self::parse_create(&args),
            "status" => Self::Status,
            "roll" => Self::parse_roll(&args),
            "mode" => match args.as_slice() {
                [state] => Self::Mode(state.to_lowercase()),
                _ => Self::Usage(MODE_USAGE),
            },
            "help" => Self::Help,
            _ => Self::Unknown(format!("/{name}")),
        };
        Some(command)
    }

    fn parse_create(args: &[&str]) -> Self {
        match args {
            [auto] if auto.eq_ignore_ascii_case("auto") => Self::Create(CreateArgs::Auto),
            [name @ .., race, class] if !name.is_empty() => Self::Create(CreateArgs::Manual {
                name: name.join(" "),
                race: race.to_string(),
                class: class.to_string(),
            }),
            _ => Self::Usage(CREATE_USAGE),
        }
    }

    fn parse_roll(args: &[&str]) -> Self {
        let (expression, mode) = match args {
            [expression @ .., last] if !expression.is_empty() => match AdvantageMode::from_str(last) {
                Ok(mode) => (expression.concat(), mode),
                Err(_) => (args.concat(), AdvantageMode::Normal),
            },
            _ => (args.concat(), AdvantageMode::Normal),
        };
        if expression.is_empty() {
            return Self::Usage(ROLL_USAGE);
        }
        Self::Roll { expression, mode }
    }
}
