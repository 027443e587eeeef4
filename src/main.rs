use clap::{Parser, Subcommand};
use drmhook::config::{self, ipc::DEFAULT_SOCKET_PATH, OverrideTarget};
use drmhook::{setup_logging, DaemonClient, DaemonCommand, DaemonRequest};
use log::{debug, error};
use std::path::PathBuf;
use std::process::ExitCode;

/// Manage the mode override read by libdrmhook.so and talk to the display daemon
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Override file to use instead of $DRMHOOK_MODE_FILE or /var/run/drmMode
    #[arg(long, global = true)]
    mode_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current mode override
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set the mode override, e.g. 1920x1080@60
    Set {
        #[arg(value_parser = parse_target)]
        mode: OverrideTarget,
    },

    /// Remove the mode override
    Clear,

    /// Send a command to the display daemon and print its reply
    Send {
        /// Target screen identifier
        #[arg(short = 's', long, global = true)]
        screen: Option<String>,

        /// Daemon socket path
        #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
        socket: PathBuf,

        /// Additional argument passed to the daemon, may be repeated
        #[arg(long = "arg", value_name = "ARG", global = true)]
        args: Vec<String>,

        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn parse_target(s: &str) -> Result<OverrideTarget, String> {
    s.parse().map_err(|e: drmhook::Error| e.to_string())
}

fn main() -> ExitCode {
    setup_logging();
    let cli = Cli::parse();
    debug!("drmmode v{}", drmhook::version());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("drmmode: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> drmhook::Result<()> {
    let mode_file = config::mode_file_path(cli.mode_file.as_deref());

    match cli.command {
        Command::Show { json } => match config::read_override(&mode_file) {
            Ok(target) if json => println!("{}", serde_json::to_string(&target)?),
            Ok(target) => println!("{}", target),
            Err(e) => {
                debug!("Override unavailable: {}", e);
                if json {
                    println!("null");
                } else {
                    println!("no override ({}: {})", mode_file.display(), e);
                }
            }
        },
        Command::Set { mode } => {
            config::write_override(&mode_file, &mode)?;
            println!("{}", mode);
        }
        Command::Clear => {
            if !config::clear_override(&mode_file)? {
                println!("no override at {}", mode_file.display());
            }
        }
        Command::Send {
            screen,
            socket,
            command,
            args,
        } => {
            let mut request = DaemonRequest::new(command).with_args(args);
            if let Some(screen) = screen {
                request = request.with_screen(screen);
            }

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let reply = runtime.block_on(DaemonClient::new(socket).send(&request))?;
            println!("{}", reply.trim_end_matches('\n'));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_send_with_screen_and_args() {
        let cli = Cli::try_parse_from([
            "drmmode", "send", "--screen", "HDMI-A-1", "setMode", "1920x1080@60", "--arg", "extra",
        ])
        .unwrap();

        match cli.command {
            Command::Send {
                screen,
                command,
                args,
                ..
            } => {
                let request = DaemonRequest::new(command)
                    .with_args(args)
                    .with_screen(screen.unwrap());
                assert_eq!(
                    request.to_string(),
                    "setMode 1920x1080@60 --screen HDMI-A-1 extra"
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_mode() {
        assert!(Cli::try_parse_from(["drmmode", "set", "1920x1080"]).is_err());
    }

    #[test]
    fn set_show_clear_roundtrip() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("drmMode");
        let file = path.to_str().unwrap();

        run(Cli::try_parse_from(["drmmode", "--mode-file", file, "set", "1280x720@60"]).unwrap())
            .unwrap();
        assert_eq!(
            config::read_override(&path).unwrap(),
            OverrideTarget::new(1280, 720, 60)
        );

        run(Cli::try_parse_from(["drmmode", "--mode-file", file, "show", "--json"]).unwrap())
            .unwrap();
        run(Cli::try_parse_from(["drmmode", "--mode-file", file, "clear"]).unwrap()).unwrap();
        assert!(!path.exists());
    }
}
