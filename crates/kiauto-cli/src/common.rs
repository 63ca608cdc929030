//! Pieces shared by `eeschema_do` and `pcbnew_do`: global flags, argument
//! parsing, the run pipeline and exit handling.

use crate::{exit_codes, logging};
use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser};
use clap_complete::{generate, Shell};
use kiauto::driver::{Automation, CancelToken, XdoAutomation};
use kiauto::kicad_config::KicadConfig;
use kiauto::{ExitCode, KiAutoError, KiAutoResult, Outcome, Settings};
use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// More output: -v info, -vv debug, -vvv trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Record the session to <OUTPUT_DIR>/<tool>_screencast.ogv
    #[arg(short, long, global = true)]
    pub record: bool,

    /// Recording width in pixels
    #[arg(long, value_name = "PIXELS", global = true)]
    pub rec_width: Option<u32>,

    /// Recording height in pixels
    #[arg(long, value_name = "PIXELS", global = true)]
    pub rec_height: Option<u32>,

    /// Seconds to wait for the KiCad window to appear
    #[arg(long, value_name = "SECS", global = true)]
    pub wait_start: Option<u64>,

    /// YAML settings file
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,
}

impl GlobalArgs {
    /// Settings file and environment, with command line flags on top.
    pub fn settings(&self) -> KiAutoResult<Settings> {
        let mut settings = match &self.settings {
            Some(path) => Settings::load(path)?,
            None => Settings::from_env(),
        };
        if let Some(width) = self.rec_width {
            settings.capture.width = width;
        }
        if let Some(height) = self.rec_height {
            settings.capture.height = height;
        }
        if let Some(secs) = self.wait_start {
            settings.wait_start_secs = secs;
        }
        Ok(settings)
    }
}

/// Parse the command line. Usage errors exit with `WRONG_ARGUMENTS`,
/// `--help` and `--version` with 0.
pub fn parse_args<C: Parser>() -> C {
    match C::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => ExitCode::WrongArguments.code(),
            };
            let _ = err.print();
            std::process::exit(code);
        }
    }
}

fn configure_reports() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(false)
                .unicode(false)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
}

/// Log `err` the way scripts expect and return its exit status.
pub fn report_error(err: KiAutoError, verbosity: u8) -> i32 {
    let code = err.exit_code();
    error!("{err}");
    if let Some(help) = err.help() {
        info!("{help}");
    }
    debug!("exiting with {code}");
    if verbosity >= 2 {
        eprintln!("{:?}", miette::Report::new(err));
    }
    code.code()
}

/// Exit status for an operation result.
pub fn exit_status(result: KiAutoResult<Outcome>, verbosity: u8) -> i32 {
    match result {
        Ok(outcome) => {
            let status = outcome.exit_status();
            if status == 0 {
                info!("{} finished cleanly", outcome.tool);
            } else {
                warn!("{} found {} problems", outcome.tool, outcome.failing);
            }
            status
        }
        Err(err) => report_error(err, verbosity),
    }
}

/// Set up logging, settings, KiCad configuration and the automation, run
/// `op` and exit with its status.
pub fn run_operation<F>(global: &GlobalArgs, op: F) -> !
where
    F: FnOnce(&KicadConfig, &dyn Automation) -> KiAutoResult<Outcome>,
{
    logging::init(global.verbose);
    configure_reports();
    let result = prepare(global).and_then(|(config, automation)| op(&config, &automation));
    std::process::exit(exit_status(result, global.verbose));
}

fn prepare(global: &GlobalArgs) -> KiAutoResult<(KicadConfig, XdoAutomation)> {
    let settings = global.settings()?;
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    // SIGINT, SIGTERM and SIGHUP all land here; the waits notice the token
    // and the config guard restores on the way out.
    if let Err(err) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("cannot install interrupt handler: {err}");
    }
    let version = settings.kicad_version()?;
    debug!("KiCad version {version}");
    let config = match &settings.kicad_config_home {
        Some(root) => KicadConfig::new(root, version),
        None => KicadConfig::discover(version)?,
    };
    debug!(dir = %config.dir().display(), "KiCad configuration");
    Ok((config, XdoAutomation::new(settings, global.record, cancel)))
}

/// `exit_codes [--json]`
pub fn print_exit_codes(json: bool) -> ! {
    if json {
        match exit_codes::render_json() {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("ERROR:{err}");
                std::process::exit(ExitCode::InternalError.code());
            }
        }
    } else {
        print!("{}", exit_codes::render_text());
    }
    std::process::exit(0);
}

/// `completions <SHELL>`
pub fn print_completions<C: CommandFactory>(shell: Shell) -> ! {
    let mut cmd = C::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    std::process::exit(0);
}
