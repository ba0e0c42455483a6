//! Weft - window-management core for a Wayland compositor
//!
//! Runs the shell state machine headless and, with the `xwayland`
//! feature, acts as the X11 window manager of an XWayland server.
//!
//! # Features
//! - xdg-shell style toplevels and popups with configure/ack tracking
//! - Interactive move and resize grabs, popup grab sessions
//! - ICCCM/EWMH window management for X11 clients
//! - TOML configuration

use anyhow::{Context, Result};
use calloop::EventLoop;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod compositor;

use compositor::Weft;
use weft_core::config::Config;

/// Weft - window-management core
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Run in debug mode with verbose logging
    #[arg(short, long)]
    debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Print default configuration to stdout
    #[arg(long)]
    print_default_config: bool,

    /// X11 display to manage (defaults to $DISPLAY)
    #[arg(long)]
    display: Option<String>,

    /// Window manager socket passed by XWayland (`-wm <fd>`)
    #[arg(long, conflicts_with = "display")]
    wm_fd: Option<i32>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_default_config {
        println!("{}", Config::default_config_string());
        return Ok(());
    }

    let loaded = Config::load(args.config.as_deref());
    let filter = match &loaded {
        Ok(config) => config.log.filter.as_str(),
        Err(_) => "info",
    };
    init_logging(filter, args.debug)?;

    info!("Weft v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        },
        Err(e) if args.validate => return Err(e),
        Err(e) => {
            warn!("Failed to load config: {:#}, using defaults", e);
            Config::default()
        },
    };

    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    run(config, &args)
}

fn init_logging(filter: &str, debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
        .context("Failed to install the log subscriber")
}

fn run(config: Config, args: &Args) -> Result<()> {
    let mut event_loop: EventLoop<'static, Weft> =
        EventLoop::try_new().context("Failed to create the event loop")?;
    let mut weft = Weft::new(config.clone());

    if config.xwayland.enabled {
        attach_xwayland(&mut weft, &event_loop, args)?;
    } else {
        info!("XWayland window management disabled by configuration");
    }

    if !weft.shell.is_attached() {
        info!("No X11 server to manage, exiting");
        return Ok(());
    }

    let signal = event_loop.get_signal();
    event_loop
        .run(None, &mut weft, |weft| {
            if weft.should_exit {
                signal.stop();
            }
        })
        .context("Event loop failed")?;

    info!("Weft shut down");
    Ok(())
}

#[cfg(feature = "xwayland")]
fn attach_xwayland(weft: &mut Weft, event_loop: &EventLoop<'static, Weft>, args: &Args) -> Result<()> {
    use std::os::fd::{FromRawFd, OwnedFd};

    use weft_core::surface::ClientId;
    use weft_xwayland::{insert_source, RustWire};

    /// The proxy server has no native client id in headless mode.
    const XWAYLAND_CLIENT: ClientId = ClientId(0);

    let wire = match args.wm_fd {
        Some(fd) => {
            // SAFETY: the descriptor is inherited from XWayland for our sole use.
            #[allow(unsafe_code)]
            let fd = unsafe { OwnedFd::from_raw_fd(fd) };
            RustWire::from_fd(fd).context("Failed to adopt the window manager socket")?
        },
        None => RustWire::connect(args.display.as_deref())
            .context("Failed to connect to the X11 display")?,
    };

    insert_source(&event_loop.handle(), &wire, Weft::dispatch_x11)
        .context("Failed to watch the X11 socket")?;
    weft.shell
        .attach_xwayland(wire, XWAYLAND_CLIENT)
        .context("Failed to become the X11 window manager")?;

    // Events queued while attaching do not wake the loop.
    weft.dispatch_x11();
    Ok(())
}

#[cfg(not(feature = "xwayland"))]
fn attach_xwayland(_weft: &mut Weft, _event_loop: &EventLoop<'static, Weft>, args: &Args) -> Result<()> {
    if args.display.is_some() || args.wm_fd.is_some() {
        anyhow::bail!("XWayland support not compiled in. Rebuild with --features xwayland");
    }
    warn!("XWayland support not compiled in");
    Ok(())
}
