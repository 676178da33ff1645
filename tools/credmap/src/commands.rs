use crate::errors::CredmapError;
use crate::partition::BucketId;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBinding {
    pub usage: &'static str,
    pub action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load(PathBuf),
    Show,
    Move {
        from: BucketId,
        from_index: usize,
        to: BucketId,
        to_index: usize,
    },
    Assign {
        role: BucketId,
        index: usize,
    },
    Unassign {
        role: BucketId,
        index: usize,
    },
    Undo,
    Redo,
    Set {
        name: String,
        value: String,
    },
    Options,
    Generate,
    Help,
    Quit,
}

pub const SESSION_BINDINGS: [CommandBinding; 12] = [
    CommandBinding {
        usage: "load <path>",
        action: "load a recording",
    },
    CommandBinding {
        usage: "show",
        action: "draw the board",
    },
    CommandBinding {
        usage: "move <bucket>:<i> <bucket>:<j>",
        action: "move a field",
    },
    CommandBinding {
        usage: "assign <role> <i>",
        action: "unassigned[i] to end of role",
    },
    CommandBinding {
        usage: "unassign <role> <i>",
        action: "role[i] back to unassigned",
    },
    CommandBinding {
        usage: "undo",
        action: "undo last move",
    },
    CommandBinding {
        usage: "redo",
        action: "redo",
    },
    CommandBinding {
        usage: "set <option> <value>",
        action: "edit a password option",
    },
    CommandBinding {
        usage: "options",
        action: "list password options",
    },
    CommandBinding {
        usage: "generate",
        action: "print the payload",
    },
    CommandBinding {
        usage: "help",
        action: "this list",
    },
    CommandBinding {
        usage: "quit",
        action: "end the session",
    },
];

pub fn commands_legend() -> String {
    let parts = SESSION_BINDINGS
        .iter()
        .map(|binding| format!("{} - {}", binding.usage, binding.action))
        .collect::<Vec<_>>();
    format!("Commands:\n  {}", parts.join("\n  "))
}

pub fn parse_command(line: &str) -> Result<Command, CredmapError> {
    let words = line.split_whitespace().collect::<Vec<_>>();
    let Some((head, args)) = words.split_first() else {
        return Err(CredmapError::Cli("empty command".to_string()));
    };

    let command = match (head.to_ascii_lowercase().as_str(), args) {
        ("load", [_, ..]) => Command::Load(PathBuf::from(args.join(" "))),
        ("show" | "board", []) => Command::Show,
        ("move", [from, to]) => {
            let (from, from_index) = parse_position(from)?;
            let (to, to_index) = parse_position(to)?;
            Command::Move {
                from,
                from_index,
                to,
                to_index,
            }
        }
        ("assign", [role, index]) => Command::Assign {
            role: BucketId::parse(role),
            index: parse_index(index)?,
        },
        ("unassign", [role, index]) => Command::Unassign {
            role: BucketId::parse(role),
            index: parse_index(index)?,
        },
        ("undo", []) => Command::Undo,
        ("redo", []) => Command::Redo,
        ("set", [name, _, ..]) => Command::Set {
            name: name.to_string(),
            value: value_after(line, 2),
        },
        ("options", []) => Command::Options,
        ("generate" | "gen", []) => Command::Generate,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        (head, _) => {
            return Err(CredmapError::Cli(format!(
                "unrecognized command {head:?}; type help"
            )))
        }
    };
    Ok(command)
}

/// `bucket:index`, e.g. `unassigned:0` or `usernameMappings:1`.
pub fn parse_position(text: &str) -> Result<(BucketId, usize), CredmapError> {
    let (bucket, index) = text
        .rsplit_once(':')
        .ok_or_else(|| CredmapError::Cli(format!("expected <bucket>:<index>, got {text:?}")))?;
    if bucket.is_empty() {
        return Err(CredmapError::Cli(format!("missing bucket in {text:?}")));
    }
    Ok((BucketId::parse(bucket), parse_index(index)?))
}

/// `<bucket>:<i>=<bucket>:<j>` as accepted by `--move`.
pub fn parse_move_spec(text: &str) -> Result<(BucketId, usize, BucketId, usize), CredmapError> {
    let (from, to) = text
        .split_once('=')
        .ok_or_else(|| CredmapError::Cli(format!("expected <from>=<to>, got {text:?}")))?;
    let (from, from_index) = parse_position(from.trim())?;
    let (to, to_index) = parse_position(to.trim())?;
    Ok((from, from_index, to, to_index))
}

/// `<name>=<value>` as accepted by `--set` and `--assign`.
pub fn parse_key_value(text: &str) -> Result<(String, String), CredmapError> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| CredmapError::Cli(format!("expected <name>=<value>, got {text:?}")))?;
    if key.trim().is_empty() {
        return Err(CredmapError::Cli(format!("missing name in {text:?}")));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn parse_index(text: &str) -> Result<usize, CredmapError> {
    text.trim()
        .parse::<usize>()
        .map_err(|_| CredmapError::Cli(format!("expected an index, got {text:?}")))
}

/// Rest of the line after `skip` words, keeping inner spacing.
fn value_after(line: &str, skip: usize) -> String {
    let mut rest = line.trim_start();
    for _ in 0..skip {
        rest = rest
            .find(char::is_whitespace)
            .map_or("", |at| rest[at..].trim_start());
    }
    rest.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::{commands_legend, parse_command, parse_key_value, parse_move_spec, Command};
    use crate::partition::BucketId;
    use std::path::PathBuf;

    #[test]
    fn parses_every_command() {
        assert_eq!(
            parse_command("load /tmp/my recording.json").expect("load"),
            Command::Load(PathBuf::from("/tmp/my recording.json"))
        );
        assert_eq!(parse_command("show").expect("show"), Command::Show);
        assert_eq!(
            parse_command("move unmappedFields:2 usernameMappings:0").expect("move"),
            Command::Move {
                from: BucketId::Unassigned,
                from_index: 2,
                to: BucketId::role("usernameMappings"),
                to_index: 0,
            }
        );
        assert_eq!(
            parse_command("assign newPasswordMappings 1").expect("assign"),
            Command::Assign {
                role: BucketId::role("newPasswordMappings"),
                index: 1,
            }
        );
        assert_eq!(
            parse_command("set symbolsToUse  !@ #").expect("set"),
            Command::Set {
                name: "symbolsToUse".to_string(),
                value: "!@ #".to_string(),
            }
        );
        assert_eq!(parse_command("UNDO").expect("undo"), Command::Undo);
        assert_eq!(parse_command("q").expect("quit"), Command::Quit);
    }

    #[test]
    fn malformed_commands_are_rejected() {
        for line in ["", "move a:1", "move a b:1", "assign role x", "dance", "load", "undo now"] {
            assert!(parse_command(line).is_err(), "{line}");
        }
    }

    #[test]
    fn move_and_key_value_specs() {
        let (from, i, to, j) = parse_move_spec("unassigned:0=passwordMappings:1").expect("spec");
        assert_eq!((from, i, to, j), (BucketId::Unassigned, 0, BucketId::role("passwordMappings"), 1));
        assert!(parse_move_spec("unassigned:0").is_err());
        assert_eq!(
            parse_key_value("exclude=a=b").expect("kv"),
            ("exclude".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("=1").is_err());
    }

    #[test]
    fn legend_lists_every_binding() {
        let legend = commands_legend();
        assert!(legend.starts_with("Commands:"));
        assert!(legend.contains("generate - print the payload"));
        assert_eq!(legend.lines().count(), 13);
    }
}
