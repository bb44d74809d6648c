use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use trade_map::app::App;
use trade_map::fetch::{ImfClient, TradeSource};
use trade_map::generate::{build_atlas, build_renderer, Generator};
use trade_map::plots::PlotStore;
use trade_map::{logging, ui, Config, Period};

#[derive(Parser, Debug)]
#[command(name = "trade-map")]
#[command(about = "World maps of each country's largest import partner among the USA, China and the EU")]
struct Cli {
    /// TOML config file (defaults to ./trade-map.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the rendered maps
    #[arg(long)]
    plots_dir: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a map for every month in the trade data
    Generate {
        /// Re-render months that already have an image
        #[arg(long)]
        force: bool,
    },
    /// Render the map of a single month, replacing any existing image
    Render {
        #[arg(long)]
        period: Period,
    },
    /// Step through the rendered maps in the terminal
    View {
        #[arg(long)]
        start: Option<Period>,
        #[arg(long)]
        end: Option<Period>,
        /// Render missing months on demand
        #[arg(long)]
        lazy: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.plots_dir {
        config.output.plots_dir = dir;
    }

    match cli.command {
        Command::Generate { force } => {
            logging::init_cli_logger(cli.verbose);
            let generator = prepare(&config)?;
            let summary = generator.render_all(force)?;
            println!(
                "{} rendered, {} skipped, {} failed in {}",
                summary.rendered,
                summary.skipped,
                summary.failed,
                generator.store().dir().display()
            );
            if summary.failed > 0 {
                bail!("{} maps could not be rendered", summary.failed);
            }
        }
        Command::Render { period } => {
            logging::init_cli_logger(cli.verbose);
            let path = prepare(&config)?.render(period)?;
            println!("{}", path.display());
        }
        Command::View { start, end, lazy } => {
            if let Some(start) = start {
                config.viewer.start = start.to_string();
            }
            if let Some(end) = end {
                config.viewer.end = Some(end.to_string());
            }
            config.viewer.lazy_generate |= lazy;
            config.validate()?;
            logging::init_file_logger(&config.viewer.log_file, cli.verbose)
                .with_context(|| format!("opening log file {}", config.viewer.log_file.display()))?;
            view(config)?;
        }
    }

    Ok(())
}

/// Fetch trade data and set up rendering into the plots directory
fn prepare(config: &Config) -> Result<Generator> {
    let mut client = ImfClient::new(&config.source)?;
    let atlas = build_atlas(&mut client, config).context("fetching trade data")?;
    let renderer = build_renderer(config)?;
    let store = PlotStore::new(&config.output.plots_dir, config.render.format);
    Ok(Generator::new(atlas, renderer, store))
}

fn view(config: Config) -> Result<()> {
    let source: Box<dyn TradeSource> = Box::new(ImfClient::new(&config.source)?);
    let mut app = App::new(config, Some(source)).context("starting viewer")?;

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run(&mut terminal, &mut app);

    ratatui::restore();
    result
}

fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        // Short poll keeps playback ticking between key presses
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (not release)
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                        KeyCode::Left | KeyCode::Char('h') => app.step(-1),
                        KeyCode::Right | KeyCode::Char('l') => app.step(1),
                        KeyCode::Home => app.first(),
                        KeyCode::End => app.last(),
                        KeyCode::Char(' ') => app.toggle_play(),
                        KeyCode::Char('g') => app.generate_current(),
                        KeyCode::Char('r') => app.refresh(),
                        KeyCode::Char('i') => app.toggle_info(),
                        _ => {}
                    }
                }
            }
        }

        app.tick(Instant::now());

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
