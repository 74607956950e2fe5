//! Command-line argument parsing
//!
//! Global options override the configuration file; each subcommand maps onto
//! one registry or coordinator operation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use world_manager::WorldType;

/// Manage the worlds of a Paper server and switch the active one.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    ///
    /// If the file doesn't exist, a default configuration will be created.
    #[arg(short, long, default_value = "worldctl.toml")]
    pub config: PathBuf,

    /// Override the server root directory from the configuration file
    #[arg(long, global = true)]
    pub server_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List every world with its size and active flag
    List,

    /// Show one world
    Get { id: String },

    /// Show the active world, or null if the pointer does not resolve
    Active,

    /// Create a new world
    Create {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// survival, creative, rpg, minigames, adventure or custom
        #[arg(long = "type")]
        world_type: Option<WorldType>,
        /// Custom tag, may be repeated
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Server setting as KEY=VALUE, may be repeated
        #[arg(long = "set", value_parser = parse_key_value)]
        settings: Vec<(String, String)>,
    },

    /// Make a world the active one (server must be stopped)
    Switch { id: String },

    /// Delete a world that is not active (server must be stopped)
    Delete { id: String },

    /// Update a world's descriptive metadata
    Meta {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long = "type")]
        world_type: Option<WorldType>,
        /// Replace the custom tags, may be repeated
        #[arg(long = "tag", conflicts_with = "clear_tags")]
        tags: Vec<String>,
        /// Remove all custom tags
        #[arg(long)]
        clear_tags: bool,
    },

    /// Show a world's server.properties, or update it with --set
    Props {
        id: String,
        /// Property as KEY=VALUE, may be repeated
        #[arg(long = "set", value_parser = parse_key_value)]
        set: Vec<(String, String)>,
    },

    /// Write default metadata for a world directory that has none
    Repair { id: String },

    /// Move legacy settings from metadata.json into server.properties
    MigrateSettings,
}

/// Parses a `KEY=VALUE` pair. The value may itself contain `=`.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("max-players=50").unwrap(),
            ("max-players".to_string(), "50".to_string())
        );
        assert_eq!(
            parse_key_value("motd=a=b").unwrap(),
            ("motd".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_key_value("motd=").unwrap(),
            ("motd".to_string(), String::new())
        );
        assert!(parse_key_value("pvp").is_err());
        assert!(parse_key_value("=true").is_err());
    }

    #[test]
    fn test_create_parsing() {
        let args = Args::try_parse_from([
            "worldctl",
            "create",
            "creative_hub",
            "--type",
            "Creative",
            "--tag",
            "build",
            "--tag",
            "event",
            "--set",
            "maxPlayers=50",
        ])
        .unwrap();

        assert_eq!(args.config, PathBuf::from("worldctl.toml"));
        assert_eq!(
            args.command,
            Command::Create {
                id: "creative_hub".into(),
                name: None,
                description: None,
                world_type: Some(WorldType::Creative),
                tags: vec!["build".into(), "event".into()],
                settings: vec![("maxPlayers".into(), "50".into())],
            }
        );
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let args = Args::try_parse_from([
            "worldctl",
            "-c",
            "/etc/worldctl.toml",
            "switch",
            "lobby",
            "--server-root",
            "/srv/paper",
            "--json-logs",
        ])
        .unwrap();

        assert_eq!(args.config, PathBuf::from("/etc/worldctl.toml"));
        assert_eq!(args.server_root, Some(PathBuf::from("/srv/paper")));
        assert!(args.json_logs);
        assert_eq!(args.command, Command::Switch { id: "lobby".into() });
    }

    #[test]
    fn test_meta_rejects_tags_with_clear() {
        let result = Args::try_parse_from([
            "worldctl",
            "meta",
            "w1",
            "--tag",
            "x",
            "--clear-tags",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_props_requires_key_value() {
        assert!(Args::try_parse_from(["worldctl", "props", "w1", "--set", "pvp"]).is_err());
    }
}
