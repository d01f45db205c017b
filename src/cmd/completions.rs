//! Shell completion generation

use clap::CommandFactory;

pub fn completions(shell: clap_complete::Shell) {
    let mut cmd = crate::Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
