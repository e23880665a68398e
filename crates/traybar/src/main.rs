use anyhow::{bail, Context, Result};
use icon_theme::IconThemes;
use systray::{
    render::{HotspotListener, PipelineListener},
    Tray, TrayConfig,
};

mod canvas;
mod opts;

fn main() {
    let opts: opts::Opt = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("traybar"), log_level_filter)
            .filter(Some("systray"), log_level_filter)
            .filter(Some("icon_theme"), log_level_filter)
            .init();
    }

    if let Err(err) = run(opts) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    match opts.action {
        opts::Action::Themes => {
            let icons = IconThemes::load();
            for basedir in icons.basedirs() {
                println!("{}", basedir.display());
            }
            for theme in icons.themes() {
                println!("{} ({}): {}", theme.name, theme.dir, theme.comment);
                for subdir in &theme.subdirs {
                    println!("  {} {:?} {}..={}", subdir.name, subdir.kind, subdir.min_size, subdir.max_size);
                }
            }
            Ok(())
        }
        opts::Action::Lookup { name, size } => {
            let icons = IconThemes::load();
            let size = size.unwrap_or(opts.config.icon_size);
            match icons.lookup(&name, size, &opts.config.icon_theme) {
                Some(path) => {
                    println!("{}", path.display());
                    Ok(())
                }
                None => bail!("No icon found for {:?} at size {}", name, size),
            }
        }
        opts::Action::Run => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to initialize tokio runtime")?;
            rt.block_on(serve(opts.config))
        }
    }
}

async fn serve(config: TrayConfig) -> Result<()> {
    let con = zbus::Connection::session().await.context("Failed to connect to the session bus")?;
    let icons = IconThemes::load();
    let (mut tray, mut events) =
        Tray::connect(&con, config, icons).await.context("Failed to set up the StatusNotifier watchers and hosts")?;

    let mut canvas = canvas::LogCanvas::default();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutting down");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if tray.handle_event(event) {
                    redraw(&mut tray, &mut canvas);
                }
            }
        }
    }

    Ok(())
}

fn redraw(tray: &mut Tray, canvas: &mut canvas::LogCanvas) {
    let (mut x, mut y) = (0, 0);
    tray.render(canvas, &mut x, &mut y);
    log::debug!("tray is {}px wide with {} icons, hotspot {:?}", tray.width(), canvas.take_drawn(), tray.bounds());
}
