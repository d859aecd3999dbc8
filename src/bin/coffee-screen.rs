// Coffee-Screen CLI - Settings for the menu bar app
// Configures the unlock PIN and the emergency escape chord

use anyhow::{bail, Context, Result};
use clap::Parser;
use coffee_screen::auth::{ConfigPinStore, PinSettings, PinStore};
use coffee_screen::chord::{ChordStore, ConfigChordStore, KeyChord};
use coffee_screen::config_file::Config;
use coffee_screen::constants::{APP_NAME, PIN_MAX_DIGITS, PIN_MIN_DIGITS};
use coffee_screen::error::PinError;
use log::info;
use std::io::{self, Write};
use std::sync::Arc;

/// Configure Coffee-Screen's unlock PIN and emergency escape chord
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Configure Coffee-Screen's unlock PIN and emergency escape chord",
    long_about = "Coffee-Screen covers every display with an opaque shield while you step away.
Unlock with Touch ID, or with your PIN when Touch ID is unavailable.

SETUP:
  Before locking the first time, set a PIN:
    coffee-screen --setup

  Configuration is stored at:
    ~/Library/Application Support/coffee-screen/config.toml
  (the PIN is encrypted, file permissions are 600)

EMERGENCY ESCAPE:
  Left Shift + Right Shift + Cmd + L     Unlock without authentication (default)

  Change it with --set-chord, e.g.:
    coffee-screen --set-chord \"Ctrl+Opt+K\"
  The chord must include Cmd or Ctrl. Name Shift twice to require both Shift keys.

ENVIRONMENT:
  COFFEE_SCREEN_CONFIG          Use a different config file
  COFFEE_SCREEN_ESCAPE_KEY      Replace the chord key for one run (A-Z, 0-9)
  COFFEE_SCREEN_PREVENT_SLEEP   Set to 0 to let the display sleep while locked"
)]
struct Args {
    /// Interactive setup: PIN and optional emergency chord
    #[arg(long)]
    setup: bool,

    /// Set or change the unlock PIN (prompted, hidden)
    #[arg(long, conflicts_with = "delete_pin")]
    set_pin: bool,

    /// Delete the stored PIN (locking is disabled until a new one is set)
    #[arg(long)]
    delete_pin: bool,

    /// Set the emergency escape chord, e.g. "Shift+Shift+Cmd+L"
    #[arg(long, value_name = "CHORD", conflicts_with = "reset_chord")]
    set_chord: Option<String>,

    /// Restore the default emergency escape chord
    #[arg(long)]
    reset_chord: bool,

    /// Show the current configuration
    #[arg(long)]
    status: bool,
}

struct Stores {
    pins: Arc<ConfigPinStore>,
    chords: Arc<ConfigChordStore>,
}

impl Stores {
    fn open() -> Result<Self> {
        let path = Config::config_path()?;
        let pins = ConfigPinStore::open(path.clone()).context("Failed to load PIN")?;
        let chords = ConfigChordStore::open(path).context("Failed to load escape chord")?;
        Ok(Self {
            pins: Arc::new(pins),
            chords: Arc::new(chords),
        })
    }
}

/// Prompt for a line of input with a default value
fn prompt_line(prompt: &str, default: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input.to_string())
    }
}

fn prompt_pin(settings: &mut PinSettings) -> Result<()> {
    let pin = rpassword::prompt_password(format!(
        "Enter PIN ({}-{} digits): ",
        PIN_MIN_DIGITS, PIN_MAX_DIGITS
    ))
    .context("Failed to read PIN")?;
    let confirm = rpassword::prompt_password("Confirm PIN: ").context("Failed to read confirmation")?;

    settings.set_new_pin(pin);
    settings.set_confirm_pin(confirm);

    match settings.set_pin() {
        Ok(()) => Ok(()),
        Err(PinError::Mismatch) => bail!("Error: PINs do not match"),
        Err(PinError::InvalidFormat) => bail!(
            "Error: PIN must be {}-{} digits",
            PIN_MIN_DIGITS,
            PIN_MAX_DIGITS
        ),
        Err(e) => Err(e).context("Failed to save PIN"),
    }
}

fn set_chord(chords: &dyn ChordStore, value: &str) -> Result<KeyChord> {
    let chord: KeyChord = value
        .parse()
        .with_context(|| format!("Invalid chord: {}", value))?;
    if !chord.is_valid() {
        bail!("Error: {} must include Cmd or Ctrl", chord);
    }
    if !chords.set(&chord) {
        bail!("Failed to save escape chord");
    }
    Ok(chord)
}

/// Run interactive setup to configure PIN and escape chord
fn run_setup(stores: &Stores) -> Result<()> {
    println!("{} Setup", APP_NAME);
    println!("===================\n");

    let mut settings = PinSettings::new(stores.pins.clone());
    if settings.is_pin_set() {
        let answer = prompt_line("A PIN is already set. Replace it? [y/N]: ", "n")?;
        if answer.eq_ignore_ascii_case("y") {
            prompt_pin(&mut settings)?;
        }
    } else {
        prompt_pin(&mut settings)?;
    }

    let current = stores.chords.current();
    let answer = prompt_line(
        &format!("Emergency escape chord (default: {}): ", current),
        "",
    )?;
    if !answer.is_empty() {
        set_chord(stores.chords.as_ref(), &answer)?;
    }

    println!("\nConfiguration saved to: {}", Config::config_path()?.display());
    println!("Setup complete!");
    println!("\nStart the menu bar app and choose 'Lock Screen' to lock.");
    Ok(())
}

fn print_status(stores: &Stores) -> Result<()> {
    println!("Config file:     {}", Config::config_path()?.display());
    println!(
        "PIN:             {}",
        if stores.pins.is_set() { "set" } else { "not set" }
    );
    println!(
        "Escape chord:    {}{}",
        stores.chords.current(),
        if stores.chords.is_custom() { "" } else { " (default)" }
    );
    println!(
        "Touch ID:        {}",
        if coffee_screen::auth::touchid::is_available() {
            "available"
        } else {
            "not available"
        }
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let stores = Stores::open()?;

    if args.setup {
        return run_setup(&stores);
    }

    let mut did_something = false;

    if args.set_pin {
        let mut settings = PinSettings::new(stores.pins.clone());
        prompt_pin(&mut settings)?;
        println!("PIN saved.");
        did_something = true;
    }

    if args.delete_pin {
        let mut settings = PinSettings::new(stores.pins.clone());
        settings.delete_pin().context("Failed to delete PIN")?;
        println!("PIN deleted. Locking is disabled until a new PIN is set.");
        did_something = true;
    }

    if let Some(ref value) = args.set_chord {
        let chord = set_chord(stores.chords.as_ref(), value)?;
        info!("Escape chord set to {}", chord);
        println!("Emergency escape chord set to {}.", chord);
        did_something = true;
    }

    if args.reset_chord {
        stores.chords.reset_to_default();
        println!("Emergency escape chord reset to {}.", stores.chords.current());
        did_something = true;
    }

    if args.status || !did_something {
        print_status(&stores)?;
    }

    Ok(())
}
