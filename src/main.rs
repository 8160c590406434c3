// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use padkit::audio::impulse::Impulse;
use padkit::audio::{self, AudioMixer};
use padkit::config::{self, EngineConfig};
use padkit::kit::{SampleCatalog, VoiceUpdate};
use padkit::sampler::FileLoader;
use padkit::store::FileStore;
use padkit::DrumEngine;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long to wait for samples to load before accepting triggers.
const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `hit` lets the last voice ring out.
const RING_OUT: Duration = Duration::from_millis(2500);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A drum pad voice engine."
)]
struct Cli {
    /// The path to the engine config.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured audio output device.
    #[arg(short, long)]
    device: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the configured voices.
    Voices {},
    /// Replaces the kit with the default kit.
    Reset {},
    /// Removes every voice.
    Clear {},
    /// Adds a voice.
    Add {
        /// The voice type, e.g. Kick or Clap. Used as the id prefix and label.
        template_type: String,
        /// The sample to play. Omit for a synthesized voice.
        path: Option<String>,
    },
    /// Updates a voice.
    Set {
        /// The id of the voice to update.
        id: String,
        /// Volume between 0 and 1.
        #[arg(short, long)]
        volume: Option<f32>,
        /// Mute group. 0 clears the group.
        #[arg(short, long)]
        mute_group: Option<u32>,
        /// Key binding, a single character or "space".
        #[arg(short, long)]
        key: Option<String>,
        /// Sample path. An empty string makes the voice synthesized.
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Removes a voice.
    Remove {
        /// The id of the voice to remove.
        id: String,
    },
    /// Shows or sets the reverb wet amount (0 to 100).
    Reverb {
        /// The new wet amount.
        percent: Option<f32>,
    },
    /// Manages saved presets.
    Presets {
        #[clap(subcommand)]
        command: PresetCommands,
    },
    /// Reads keys from stdin, one per line, and triggers the bound voices.
    /// An empty line is the space bar.
    Play {},
    /// Triggers voices in order and lets them ring out.
    Hit {
        /// The ids of the voices to trigger.
        #[arg(required = true)]
        ids: Vec<String>,
        /// Delay between hits in milliseconds.
        #[arg(short, long, default_value_t = 250)]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum PresetCommands {
    /// Lists saved presets.
    List {},
    /// Saves the current kit.
    Save { name: String },
    /// Replaces the kit with a saved preset.
    Load { name: String },
    /// Deletes a saved preset.
    Delete { name: String },
}

/// Everything a command needs. The output, when opened, must outlive the engine's
/// playbacks.
struct Host {
    engine: DrumEngine,
    mixer: Option<AudioMixer>,
    config: EngineConfig,
}

impl Host {
    fn new(config: EngineConfig) -> Result<Host, Box<dyn Error>> {
        let store = Arc::new(FileStore::open(config.state_dir())?);
        let catalog = load_catalog(&config);
        let loader = Arc::new(FileLoader::new(config.sounds(), config.sample_rate()));

        let mut rng = StdRng::from_entropy();
        let impulse = Impulse::generate(config.sample_rate(), &mut rng);
        let (mixer, handle) = AudioMixer::new(config.sample_rate(), &impulse);

        let engine = DrumEngine::new(handle, store, catalog, loader, config.max_voices());
        Ok(Host {
            engine,
            mixer: Some(mixer),
            config,
        })
    }

    /// Opens the audio output and waits for samples so triggers are not dropped.
    fn open_output(&mut self) -> Result<Box<dyn audio::Output>, Box<dyn Error>> {
        let mixer = self.mixer.take().ok_or("audio output already open")?;
        let output = audio::open_output(self.config.device(), mixer)?;
        info!(output = %output, "Audio output open");

        if !self.engine.wait_for_samples(LOAD_TIMEOUT) {
            warn!("Timed out waiting for samples to load");
        }
        Ok(output)
    }
}

fn load_catalog(config: &EngineConfig) -> SampleCatalog {
    let catalog = match config.manifest() {
        Some(manifest) => SampleCatalog::from_manifest(manifest, config.sounds()),
        None => SampleCatalog::scan(config.sounds()),
    };
    catalog.unwrap_or_else(|e| {
        warn!(err = %e, "Unable to read the sample catalog, voices will be synthesized");
        SampleCatalog::empty(config.sounds())
    })
}

fn print_voices(engine: &DrumEngine) {
    if engine.voices().is_empty() {
        println!("No voices configured.");
        return;
    }

    println!("Voices (count: {}):", engine.voices().len());
    for voice in engine.voices() {
        let source = voice.source().unwrap_or("(synthesized)");
        let key = voice.default_key().unwrap_or("-");
        let group = voice
            .mute_group()
            .map(|g| g.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "- {} \"{}\" key={} volume={:.2} group={} {}",
            voice.id(),
            voice.label(),
            key,
            voice.volume(),
            group,
            source
        );
    }
}

fn file_name(path: &str) -> Option<String> {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Devices {} = cli.command {
        let devices = audio::list_devices()?;

        if devices.is_empty() {
            println!("No devices found.");
            return Ok(());
        }

        println!("Devices:");
        for device in devices {
            println!("- {}", device);
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => config::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(device) = &cli.device {
        config = config.with_device(device);
    }
    let mut host = Host::new(config)?;

    match cli.command {
        Commands::Devices {} => {}
        Commands::Voices {} => print_voices(&host.engine),
        Commands::Reset {} => {
            host.engine.reset_to_default();
            print_voices(&host.engine);
        }
        Commands::Clear {} => {
            host.engine.clear_voices();
            println!("All voices removed.");
        }
        Commands::Add {
            template_type,
            path,
        } => {
            let name = path.as_deref().and_then(file_name);
            let id = host.engine.add_voice(&template_type, path, name);
            println!("Added {}.", id);
        }
        Commands::Set {
            id,
            volume,
            mute_group,
            key,
            source,
        } => {
            let mut update = VoiceUpdate::new();
            if let Some(volume) = volume {
                update = update.volume(volume);
            }
            if let Some(mute_group) = mute_group {
                update = update.mute_group(Some(mute_group).filter(|g| *g > 0));
            }
            if let Some(key) = key {
                update = update.default_key(Some(key).filter(|k| !k.is_empty()));
            }
            if let Some(source) = source {
                let source = Some(source).filter(|s| !s.is_empty());
                let name = source.as_deref().and_then(file_name);
                update = update.source(source).file_name(name);
            }

            if !host.engine.update_voice(&id, &update) {
                return Err(format!("no voice named {}", id).into());
            }
            println!("Updated {}.", id);
        }
        Commands::Remove { id } => {
            if !host.engine.remove_voice(&id) {
                return Err(format!("no voice named {}", id).into());
            }
            println!("Removed {}.", id);
        }
        Commands::Reverb { percent } => {
            let wet_amount = match percent {
                Some(percent) => host.engine.set_reverb(percent),
                None => host.engine.reverb(),
            };
            println!("Reverb: {}%", wet_amount);
        }
        Commands::Presets { command } => match command {
            PresetCommands::List {} => {
                let presets = host.engine.presets();
                if presets.is_empty() {
                    println!("No presets saved.");
                    return Ok(());
                }

                println!("Presets (count: {}):", presets.len());
                for preset in presets {
                    println!(
                        "- {} ({} voices, saved at {})",
                        preset.name,
                        preset.voices.len(),
                        preset.saved_at
                    );
                }
            }
            PresetCommands::Save { name } => {
                if !host.engine.save_preset(&name) {
                    return Err("preset names cannot be blank".into());
                }
                println!("Saved {}.", name.trim());
            }
            PresetCommands::Load { name } => {
                if !host.engine.load_preset(&name) {
                    return Err(format!("no preset named {}", name).into());
                }
                print_voices(&host.engine);
            }
            PresetCommands::Delete { name } => {
                if !host.engine.delete_preset(&name) {
                    return Err(format!("no preset named {}", name).into());
                }
                println!("Deleted {}.", name);
            }
        },
        Commands::Play {} => {
            let _output = host.open_output()?;
            println!("Ready. Type a key and press enter; end input to quit.");

            for line in io::stdin().lock().lines() {
                let line = line?;
                let key = match line.trim() {
                    "" => "space",
                    key => key,
                };
                match host.engine.trigger_key(key) {
                    Some(id) => info!(key, voice = %id, "Triggered"),
                    None => println!("Nothing bound to {}.", key),
                }
            }
        }
        Commands::Hit { ids, interval } => {
            let _output = host.open_output()?;

            for id in ids {
                if host.engine.voice(&id).is_none() {
                    warn!(voice = %id, "Unknown voice");
                    continue;
                }
                host.engine.trigger(&id);
                thread::sleep(Duration::from_millis(interval));
            }
            thread::sleep(RING_OUT);
        }
    }

    Ok(())
}
