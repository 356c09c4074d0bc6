use std::{error::Error, process, sync::Arc};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, trace, warn, LevelFilter};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use nowshowing::{
    config::Config,
    credentials::{Credential, Manager},
    display::{BackgroundMode, DisplayConfig, DisplayMode},
    poller::Poller,
    presenter::Presenter,
    secrets::Secrets,
    signal,
    spotify::Spotify,
    store::{AuthGate, ConfigEditor, ConfigStore, FileStore, StaticGate},
    view::{Layout, Phase, PlayerView, SlideView},
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when built in release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// Holds the API client credentials and the refresh token. Keep it
    /// private: the refresh token grants access to your playback state.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("secrets.toml"))]
    secrets_file: String,

    /// Display configuration file
    ///
    /// Created on the first change when missing. Send SIGHUP to reload it
    /// after editing by hand.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("display.toml"))]
    display_config: String,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, Subcommand)]
enum Command {
    /// Present the now playing view until interrupted (default)
    Run,

    /// Print the URL that starts the authorization flow
    AuthorizeUrl,

    /// Exchange an authorization code for a refresh token
    Exchange {
        /// The `code` parameter of the redirect
        #[arg(long)]
        code: String,
    },

    /// Change one display setting
    ///
    /// Keys: scale, background-mode, progress-bar, display-mode, interval,
    /// add-slide, remove-slide, toggle-slide, freeze. Freeze to "none" to
    /// unfreeze.
    Set { key: String, value: String },
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Describes a player view for the log, leaving out the progress.
fn describe_player(view: &PlayerView) -> String {
    match view {
        PlayerView::Unauthenticated => "login required".to_owned(),
        PlayerView::Error(message) => format!("error: {message}"),
        PlayerView::NoActiveTrack => "nothing playing".to_owned(),
        PlayerView::Displaying { track, phase, .. } => match phase {
            Phase::Idle => format!("{track}"),
            Phase::Transitioning { incoming: Some(next) } => format!("{track} -> {next}"),
            Phase::Transitioning { incoming: None } => format!("{track} -> nothing"),
        },
    }
}

fn describe_slide(view: &SlideView) -> String {
    match view {
        SlideView::NoSlides => "no slides".to_owned(),
        SlideView::ShowingSlide { slide, phase } => match phase {
            Phase::Idle => format!("slide {slide}"),
            Phase::Transitioning { incoming } => format!("slide {slide} -> {incoming}"),
        },
    }
}

/// Headless renderer: logs every view change.
async fn render(
    mut player: watch::Receiver<PlayerView>,
    mut slides: watch::Receiver<SlideView>,
    mut config: watch::Receiver<DisplayConfig>,
    cancel: CancellationToken,
) {
    let mut last_player = String::new();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Ok(()) = player.changed() => {
                let view = player.borrow_and_update().clone();
                let description = describe_player(&view);
                if description == last_player {
                    if let PlayerView::Displaying { progress, .. } = view {
                        trace!("progress: {progress}");
                    }
                } else {
                    info!("player: {description}");
                    last_player = description;
                }
            }

            Ok(()) = slides.changed() => {
                info!("{}", describe_slide(&slides.borrow_and_update()));
            }

            Ok(()) = config.changed() => {
                let config = config.borrow_and_update().clone();
                let layout = Layout::from_config(&config);
                info!(
                    "display: {:?} mode, {:?} background, progress bar {}",
                    config.display_mode,
                    config.background_mode,
                    if config.show_progress_bar { "on" } else { "off" },
                );
                debug!("layout: {layout:?}");
            }

            else => break,
        }
    }
}

/// Prints refresh tokens that the accounts service rotated, so they can be
/// stored in the secrets file. The stored one stops working after rotation.
async fn report_rotation(
    mut credentials: watch::Receiver<Option<Credential>>,
    mut known: Option<String>,
    secrets_file: String,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            changed = credentials.changed() => {
                if changed.is_err() {
                    break;
                }

                let rotated = credentials
                    .borrow_and_update()
                    .as_ref()
                    .and_then(|c| c.rotated_refresh_token(known.as_deref()))
                    .map(ToOwned::to_owned);
                if let Some(refresh_token) = rotated {
                    warn!("refresh token rotated; update {secrets_file} with:");
                    println!("refresh_token = \"{refresh_token}\"");
                    known = Some(refresh_token);
                }
            }
        }
    }
}

async fn present(args: &Args, secrets: &Secrets, config: &Config) -> Result<(), Box<dyn Error>> {
    let spotify = Arc::new(Spotify::new(config)?);

    let credential = secrets
        .refresh_token
        .as_deref()
        .map(Credential::from_refresh_token);
    if credential.is_none() {
        info!(
            "no refresh token in {}; see the authorize-url command",
            args.secrets_file
        );
    }

    let manager = Manager::new(spotify.clone(), credential);
    let credentials = manager.subscribe();
    let poller = Poller::new(Arc::new(Mutex::new(manager)), spotify);

    let store = FileStore::load(&args.display_config).await?;
    let presenter = Presenter::new(store.subscribe(), poller, config.timing);

    let cancel = CancellationToken::new();
    let renderer = tokio::spawn(render(
        presenter.player_view(),
        presenter.slide_view(),
        presenter.config(),
        cancel.clone(),
    ));
    let presenter = tokio::spawn(presenter.run(cancel.clone()));
    let rotation = tokio::spawn(report_rotation(
        credentials,
        secrets.refresh_token.clone(),
        args.secrets_file.clone(),
        cancel.clone(),
    ));

    let mut signals = signal::Handler::new()?;
    loop {
        let signal = signals.recv().await;
        if signal.is_stop() {
            info!("{signal} received; shutting down gracefully");
            break;
        }

        info!("{signal} received; reloading {}", args.display_config);
        if let Err(e) = store.reload().await {
            error!("{e}");
        }
    }

    cancel.cancel();
    presenter.await?;
    rotation.await?;
    renderer.await?;
    Ok(())
}

async fn exchange(config: &Config, code: &str) -> Result<(), Box<dyn Error>> {
    let mut manager = Manager::new(Arc::new(Spotify::new(config)?), None);
    manager.authorize(code).await?;

    match manager.credential().and_then(|c| c.refresh_token.as_deref()) {
        Some(refresh_token) => {
            println!("refresh_token = \"{refresh_token}\"");
            Ok(())
        }
        None => Err("authorization returned no refresh token".into()),
    }
}

async fn set(args: &Args, secrets: &Secrets, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
    let (Some(identity), Some(secret)) = (&secrets.config_identity, &secrets.config_secret) else {
        return Err(format!(
            "config_identity and config_secret must be set in {}",
            args.secrets_file
        )
        .into());
    };

    let gate = Arc::new(StaticGate::new(identity.as_str(), secret.as_str()));
    gate.login(identity, secret)?;

    let store = Arc::new(FileStore::load(&args.display_config).await?);
    let mut editor = ConfigEditor::new(store, gate.clone());

    match key {
        "scale" => editor.set_scale(value.parse()?).await?,
        "background-mode" => {
            let mode = match value {
                "cover" => BackgroundMode::Cover,
                "black" => BackgroundMode::Black,
                _ => return Err(format!("invalid background mode: {value}").into()),
            };
            editor.set_background_mode(mode).await?;
        }
        "progress-bar" => editor.set_show_progress_bar(value.parse()?).await?,
        "display-mode" => {
            let mode = match value {
                "player" => DisplayMode::Player,
                "images" => DisplayMode::Images,
                _ => return Err(format!("invalid display mode: {value}").into()),
            };
            editor.set_display_mode(mode).await?;
        }
        "interval" => editor.set_slide_interval(value.parse()?).await?,
        "add-slide" => editor.add_slide(value).await?,
        "remove-slide" => editor.remove_slide(value).await?,
        "toggle-slide" => editor.toggle_slide(value).await?,
        "freeze" if value == "none" => editor.unfreeze().await?,
        "freeze" => editor.freeze(value).await?,
        _ => return Err(format!("unknown setting: {key}").into()),
    }

    gate.logout();
    info!("saved {}", args.display_config);
    Ok(())
}

/// Dispatches the command.
///
/// # Errors
///
/// Returns an error when the secrets file cannot be loaded, or when the
/// command fails. Presenting only fails at start up: once running, network
/// and API errors show up in the views.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let secrets = Secrets::from_file(&args.secrets_file)?;
    let config = Config::with_secrets(&secrets)?;
    debug!("{config:?}");

    match args.command.clone().unwrap_or(Command::Run) {
        Command::Run => present(&args, &secrets, &config).await,
        Command::AuthorizeUrl => {
            println!("{}", Spotify::new(&config)?.authorize_url()?);
            Ok(())
        }
        Command::Exchange { code } => exchange(&config, &code).await,
        Command::Set { key, value } => set(&args, &secrets, &key, &value).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();
    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
