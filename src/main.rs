use std::process;
use std::time::Duration;

use clap::Parser;
use clap::error::ErrorKind;

use rasterize::cli::Cli;
use rasterize::config;
use rasterize::connection::LaunchOptions;
use rasterize::error::{AppError, ExitCode};
use rasterize::geometry::{self, OutputFormat};
use rasterize::render::{self, DEFAULT_SETTLE_DELAY_MS, RenderOpts, RenderSession};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version are not failures; everything else is a usage
            // error and exits 1 rather than clap's default 2.
            match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = err.print();
                    process::exit(ExitCode::Success as i32);
                }
                _ => {
                    let _ = err.print();
                    process::exit(ExitCode::GeneralError as i32);
                }
            }
        }
    };

    match run(cli).await {
        Ok(()) => process::exit(ExitCode::Success as i32),
        Err(err) => {
            err.print_json_stderr();
            process::exit(err.code as i32);
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let file = config::load(cli.global.config.as_deref())?;

    // Precedence: CLI flag (env-backed) > config file > built-in default.
    let host = cli
        .global
        .host
        .or(file.connection.host)
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = cli.global.port.or(file.connection.port);
    let load_timeout = cli
        .global
        .timeout
        .or(file.connection.timeout_ms)
        .map(Duration::from_millis);
    let settle_delay = Duration::from_millis(
        cli.global
            .settle_delay
            .or(file.render.settle_delay_ms)
            .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
    );

    let mut extra_args = file.launch.extra_args.unwrap_or_default();
    extra_args.extend(cli.global.chrome_arg);
    let launch = LaunchOptions {
        chrome_path: cli
            .global
            .chrome_path
            .or(file.launch.executable.map(Into::into)),
        extra_args,
        ..LaunchOptions::default()
    };

    let address = render::normalize_address(&cli.address);
    let format = OutputFormat::from_output_path(&cli.output);
    let geometry = geometry::resolve(&cli.output, cli.size.as_deref());

    let session = RenderSession {
        address,
        output: cli.output,
        format,
        geometry,
        zoom: cli.zoom,
        settle_delay,
        load_timeout,
    };
    let opts = RenderOpts {
        host,
        port,
        ws_url: cli.global.ws_url,
        launch,
    };

    let outcome = render::run(&session, &opts).await?;
    match serde_json::to_string(&outcome) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{}", outcome.output),
    }
    Ok(())
}
