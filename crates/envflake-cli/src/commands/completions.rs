use clap::CommandFactory;
use clap_complete::Shell;

/// Write the completion script for `shell` to stdout, named after the binary.
#[allow(clippy::unnecessary_wraps)]
pub fn run<C: CommandFactory>(shell: Shell) -> Result<u8, String> {
    let mut cmd = C::command();
    let bin_name = cmd.get_name().to_owned();
    let mut stdout = std::io::stdout().lock();
    clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout);
    Ok(super::EXIT_SUCCESS)
}
