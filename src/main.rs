use std::panic;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{debug, error};

use pmshim::config::{GrantMethod, CONFIG};
use pmshim::grant::{self, GrantRequest};
use pmshim::logging;
use pmshim::plat::utils::current_user_id;

#[derive(Parser)]
#[command(name = "pmshim", version, about = "Grant runtime permissions through the Android package manager")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Grant a runtime permission to a package.
    Grant {
        package: String,
        /// Defaults to the configured permission.
        #[arg(short, long)]
        permission: Option<String>,
        /// Defaults to the user of the calling process.
        #[arg(short, long, allow_negative_numbers = true)]
        user: Option<i32>,
        #[arg(short, long)]
        method: Option<GrantMethod>,
        /// Platform transaction code of `grantRuntimePermission`, overriding
        /// the `[[transactions]]` table. Binder method only.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=0x00ff_ffff))]
        code: Option<u32>,
    },
    /// Print the adb command that grants the permission by hand.
    Adb {
        package: String,
        #[arg(short, long)]
        permission: Option<String>,
    },
    /// Check that the package installer can be reached.
    Installer {
        /// Platform transaction code of `getPackageInstaller`.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=0x00ff_ffff))]
        code: Option<u32>,
    },
}

fn default_permission() -> anyhow::Result<String> {
    let config = CONFIG
        .read()
        .map_err(|_| anyhow::anyhow!("config lock poisoned"))?;
    Ok(config.grant.permission.clone())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Grant {
            package,
            permission,
            user,
            method,
            code,
        } => {
            let permission = permission.map_or_else(default_permission, Ok)?;
            let user = user.unwrap_or_else(current_user_id);
            let request = GrantRequest::new(Some(package), Some(permission), user)?;
            let method = match method {
                Some(m) => m,
                None => {
                    CONFIG
                        .read()
                        .map_err(|_| anyhow::anyhow!("config lock poisoned"))?
                        .grant
                        .method
                }
            };
            debug!("Granting with {method}");
            grant::grant(&request, method, code)
        }
        Command::Adb {
            package,
            permission,
        } => {
            let permission = permission.map_or_else(default_permission, Ok)?;
            let request = GrantRequest::new(Some(package), Some(permission), 0)?;
            println!("{}", grant::adb_command(&request));
            Ok(())
        }
        Command::Installer { code } => {
            let _installer = grant::package_installer(code)?;
            println!("package installer reachable");
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init_logger();
    rsbinder::ProcessState::init_default();

    // Redirect panic messages to the logger.
    panic::set_hook(Box::new(|panic_info| {
        error!("{}", panic_info);
    }));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}
