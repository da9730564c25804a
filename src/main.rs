use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::Command;

use eyre::{Result, bail};
use log::{debug, info};

mod cli;

use cli::{Cli, Commands, OutputFormat};
use ytcaps::config::Config;
use ytcaps::service::{CaptionService, CaptionsRequest};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytcaps.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytcaps")
        .join("logs")
}

fn tool_version(program: &str) -> Option<String> {
    Command::new(program)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

fn build_after_help(config: &Config) -> String {
    let program = config.ytdlp_program();
    let yt_dlp = tool_version(&program.to_string_lossy());

    let yt_dlp_line = match &yt_dlp {
        Some(v) => format!("  \x1b[32m✅\x1b[0m yt-dlp     {v}"),
        None => "  \x1b[31m❌\x1b[0m yt-dlp     (not found, needed for subtitle fallback)".to_string(),
    };

    let log_path = log_dir().join("ytcaps.log");

    format!(
        "\nREQUIRED TOOLS:\n{yt_dlp_line}\n\nConfig is read from: {}\nLogs are written to: {}",
        ytcaps::config::config_path().display(),
        log_path.display()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    // Load config file (non-fatal if missing/invalid)
    let mut config = Config::load().unwrap_or_default();

    let after_help = build_after_help(&config);
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    if cli.verbose {
        let config_path = ytcaps::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        debug!("Effective config: {config:?}");
    }

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.bind());
            let service = CaptionService::from_config(&config)?;
            if cli.verbose {
                eprintln!("Listening on {bind}");
            }
            ytcaps::server::serve(service, &bind).await
        }
        Commands::Fetch {
            url,
            lang,
            hl,
            gl,
            format,
            output,
            no_fallback,
        } => {
            if no_fallback {
                config.fallback_enabled = Some(false);
            }
            let service = CaptionService::from_config(&config)?;

            // Collect URLs: from arg or stdin
            let urls = match url {
                Some(url) => vec![url],
                None => io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?,
            };
            let urls: Vec<String> = urls
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect();

            if urls.is_empty() {
                bail!("no URL or video ID provided\n\nUsage: ytcaps fetch <URL>\n       echo <URL> | ytcaps fetch");
            }

            let mut rendered = Vec::with_capacity(urls.len());
            for url in urls {
                let request = CaptionsRequest {
                    url: url.clone(),
                    lang: lang.clone(),
                    hl: hl.clone(),
                    gl: gl.clone(),
                };
                let response = service.retrieve(request).await.map_err(|e| match e {
                    ytcaps::CaptionError::InvalidInput => eyre::eyre!(
                        "could not extract video ID from: {url}\n\nSupported formats:\n  https://www.youtube.com/watch?v=ID\n  https://youtu.be/ID\n  https://www.youtube.com/embed/ID\n  https://www.youtube.com/shorts/ID\n  <11-character video ID>"
                    ),
                    e => eyre::Report::new(e).wrap_err(format!("caption retrieval failed for {url}")),
                })?;

                if cli.verbose {
                    eprintln!("{}", ytcaps::output::render_summary(&response));
                }

                rendered.push(match format {
                    OutputFormat::Text => ytcaps::output::render_text(&response),
                    OutputFormat::Json => ytcaps::output::render_json(&response)?,
                });
            }

            let rendered = rendered.join("\n");
            match output {
                Some(path) => {
                    std::fs::write(&path, &rendered)?;
                    if cli.verbose {
                        eprintln!("Output written to: {}", path.display());
                    }
                }
                None => println!("{rendered}"),
            }

            Ok(())
        }
    }
}
