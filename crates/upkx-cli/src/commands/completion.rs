//! Shell completion generation command.

use crate::cli::Cli;
use clap::CommandFactory;
use clap_complete::Shell;
use std::io;

const BIN_NAME: &str = "upkx";

/// Writes completions for `shell` to stdout.
pub fn execute(shell: Shell) {
    generate(shell, &mut io::stdout());
}

fn generate(shell: Shell, out: &mut dyn io::Write) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, BIN_NAME, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_mentions_subcommands() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell] {
            let mut output = Vec::new();
            generate(shell, &mut output);
            let script = String::from_utf8_lossy(&output);
            assert!(script.contains("extract"), "{shell:?} completion lacks extract");
            assert!(script.contains("preview"), "{shell:?} completion lacks preview");
        }
    }
}
