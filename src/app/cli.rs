#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Run,
    Pause,
    Resume,
    Status,
    Stop,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "run" => CliVerb::Run,
        "pause" => CliVerb::Pause,
        "resume" => CliVerb::Resume,
        "status" => CliVerb::Status,
        "stop" => CliVerb::Stop,
        "help" | "-h" | "--help" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Usage: renderfleet [--config <path>] <command>".to_string(),
        String::new(),
        "Commands:".to_string(),
        "  run                                  Run the node daemon in the foreground".to_string(),
        "  pause                                Stop taking new work items after the current one"
            .to_string(),
        "  resume                               Clear the pause sentinel".to_string(),
        "  status                               Show the last persisted daemon status".to_string(),
        "  stop                                 Ask a running daemon to shut down".to_string(),
        String::new(),
        "The config path defaults to $RENDERFLEET_CONFIG, then /srv/renderfleet/config/node_config.yaml."
            .to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse_and_unknown_is_reported() {
        assert_eq!(parse_cli_verb("run"), CliVerb::Run);
        assert_eq!(parse_cli_verb("--help"), CliVerb::Help);
        assert_eq!(parse_cli_verb("start"), CliVerb::Unknown);
        assert!(help_text().contains("pause"));
    }
}
