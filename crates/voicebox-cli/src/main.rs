use std::io::Write;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};

use voicebox_engine::{devices, presets, Engine, EngineConfig, Mode};

#[derive(Parser)]
#[command(name = "voicebox", version, about = "Real-time voice changer")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List audio devices
    Devices,
    /// List the voice presets
    Presets,
    /// Run the engine live until Enter is pressed
    Run {
        /// Preset id (see `voicebox presets`); omit for pass-through
        #[arg(long)]
        preset: Option<String>,
        /// Input device name substring
        #[arg(long)]
        input: Option<String>,
        /// Output device name substring
        #[arg(long)]
        output: Option<String>,
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
        #[arg(long, value_enum, default_value = "local")]
        mode: ModeArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Local,
    Communication,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Local => Mode::Local,
            ModeArg::Communication => Mode::Communication,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Devices => devices::print_devices(),
        Command::Presets => {
            print_presets();
            Ok(())
        }
        Command::Run {
            preset,
            input,
            output,
            sample_rate,
            mode,
        } => run(preset, input, output, sample_rate, mode.into()),
    }
}

fn print_presets() {
    for p in presets::PRESETS {
        println!(
            "{:<10} {:<12} {:>2} credit(s)  [{}]  {}",
            p.id,
            p.display_name,
            p.credit_cost,
            p.category.as_str(),
            p.description
        );
    }
}

fn run(
    preset: Option<String>,
    input: Option<String>,
    output: Option<String>,
    sample_rate: u32,
    mode: Mode,
) -> Result<()> {
    let effect = match preset.as_deref() {
        Some(id) => match presets::find(id) {
            Some(p) => {
                println!("preset: {} ({})", p.display_name, p.description);
                Some(p.build())
            }
            None => bail!("unknown preset '{id}', try `voicebox presets`"),
        },
        None => None,
    };

    let cfg = EngineConfig {
        sample_rate,
        mode,
        input_name: input,
        output_name: output,
        ..EngineConfig::default()
    };
    let engine = Engine::new(cfg);
    engine.set_effect(effect);
    engine.on_amplitude(|level| {
        let bars = (level * 40.0) as usize;
        print!("\r[{:<40}] {level:.2}", "#".repeat(bars));
        let _ = std::io::stdout().flush();
    });

    if !engine.start() {
        match engine.last_error() {
            Some(e) => bail!("could not start: {e}"),
            None => bail!("could not start"),
        }
    }

    println!("running, press Enter to stop");
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);

    engine.stop();
    engine.release();
    println!();
    Ok(())
}
