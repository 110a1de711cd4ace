//! The `completion` command emits the shell snippet that registers this binary
//! as its own completer.

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Args, Debug)]
pub struct CompletionArgs {
    /// Shell type
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(args: CompletionArgs) -> Result<()> {
    let bin = env::current_exe().unwrap_or_else(|_| PathBuf::from("bundr"));
    print!("{}", script(args.shell, &bin.display().to_string()));
    Ok(())
}

fn script(shell: Shell, bin: &str) -> String {
    match shell {
        Shell::Bash => format!("complete -C {bin} bundr\n"),
        Shell::Zsh => format!(
            "autoload -U +X bashcompinit && bashcompinit\ncomplete -C {bin} bundr\n"
        ),
        Shell::Fish => format!(
            "function __complete_bundr\n\
             \x20 set -lx COMP_LINE (commandline -cp)\n\
             \x20 test -z (commandline -cp)[-1]; and set COMP_LINE \"$COMP_LINE \"\n\
             \x20 {bin}\n\
             end\n\
             complete -c bundr -a \"(__complete_bundr)\"\n"
        ),
    }
}
