use crate::app::cli::{help_text, parse_cli_verb, CliVerb};
use crate::app::command_support::{load_context, split_config_flag};

pub mod daemon;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    let (config, args) = split_config_flag(args)?;
    let Some(verb) = args.first() else {
        return Ok(help_text());
    };

    match parse_cli_verb(verb) {
        CliVerb::Run => daemon::cmd_run(load_context(config)),
        CliVerb::Pause => daemon::cmd_pause(&load_context(config)),
        CliVerb::Resume => daemon::cmd_resume(&load_context(config)),
        CliVerb::Status => daemon::cmd_status(&load_context(config)),
        CliVerb::Stop => daemon::cmd_stop(&load_context(config)),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{verb}`\n\n{}", help_text())),
    }
}
