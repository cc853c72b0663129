use std::{
    io::{self, Read, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use daikin_remote::{
    daikin::{Checksum, Clock},
    modem::{create_codec, Capture, CodecType, Lines},
    ClimateCommand, Config, FrameBuffer, Phy, Receiver, Transmitter,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Daikin infrared remote: encode, send and decode climate commands
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, default_value = "daikin-remote.json")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the three frames of a command as hex
    Encode {
        #[command(flatten)]
        state: StateArgs,

        /// Also print a hex dump of the whole buffer
        #[arg(long)]
        dump: bool,
    },
    /// Print the pulse sequence of a command
    Pulses {
        #[command(flatten)]
        state: StateArgs,

        #[arg(long, default_value = "raw")]
        format: CodecType,
    },
    /// Transmit a command, writing the emitted signal to stdout
    Send {
        #[command(flatten)]
        state: StateArgs,

        #[arg(long, default_value = "raw")]
        format: CodecType,
    },
    /// Read captures from stdin and print the decoded frames
    Decode {
        #[arg(long, default_value = "raw")]
        format: CodecType,
    },
}

#[derive(Args, Debug)]
struct StateArgs {
    /// on/off, 1/0
    #[arg(long, default_value = "on")]
    power: String,
    /// auto, dry, cool, heat, fan_only or off
    #[arg(long, default_value = "auto")]
    mode: String,
    /// Celsius, 10 to 32
    #[arg(long, default_value = "23")]
    temperature: String,
    /// Auto, Quiet, 1, 2, 3, 4 or 5
    #[arg(long, default_value = "Auto")]
    fan: String,
    #[arg(long)]
    swing_v: bool,
    #[arg(long)]
    swing_h: bool,
    #[arg(long)]
    powerful: bool,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    comfort: bool,
    #[arg(long)]
    sensor: bool,
    #[arg(long)]
    econo: bool,
    /// Set the unit clock, minutes past midnight
    #[arg(long, requires = "day")]
    minutes: Option<u16>,
    /// Day of week for the clock, Sunday = 1
    #[arg(long, requires = "minutes")]
    day: Option<u8>,
}

impl StateArgs {
    fn to_command(&self) -> anyhow::Result<ClimateCommand> {
        let command = ClimateCommand::parse(&self.power, &self.mode, &self.temperature, &self.fan)?;
        Ok(ClimateCommand {
            swing_vertical: self.swing_v,
            swing_horizontal: self.swing_h,
            powerful: self.powerful,
            quiet: self.quiet,
            comfort: self.comfort,
            sensor: self.sensor,
            econo: self.econo,
            clock: self.minutes.zip(self.day).map(|(minutes, day_of_week)| Clock {
                minutes,
                day_of_week,
            }),
            ..command
        })
    }

    fn encode(&self) -> anyhow::Result<FrameBuffer> {
        Ok(daikin_remote::encode(&self.to_command()?)?)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let level = match cli.verbose {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Encode { state, dump } => {
            let buffer = state.encode()?;
            for frame in buffer.frames() {
                println!("{}", hex::encode(frame));
            }
            if dump {
                println!(
                    "{}",
                    hexplay::HexViewBuilder::new(buffer.as_bytes())
                        .row_width(16)
                        .finish()
                );
            }
        }
        Command::Pulses { state, format } => {
            let pulses = Phy::new().encode(&state.encode()?)?;
            println!("{}", create_codec(format).encode(&pulses));
        }
        Command::Send { state, format } => {
            let buffer = state.encode()?;
            info!(carrier_hz = config.carrier_hz, duty = config.duty, "starting transmitter");

            let transmitter = Transmitter::new(Lines::new(format, Box::new(io::stdout())));
            match config.transmit_timeout() {
                Some(timeout) => transmitter.transmit_timeout(&buffer, timeout)?,
                None => transmitter.transmit(&buffer)?,
            }
        }
        Command::Decode { format } => decode(format, &config)?,
    }

    Ok(())
}

fn decode(format: CodecType, config: &Config) -> anyhow::Result<()> {
    let codec = create_codec(format);
    let phy = Phy::new();
    let receiver = Receiver::new(config.capture_capacity, config.capture_window());

    // Raw captures are one per line, an edge log is the whole input
    let inputs: Vec<String> = match format {
        CodecType::Raw => io::stdin().lines().collect::<Result<_, _>>()?,
        CodecType::Edges => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            vec![input]
        }
    };

    for input in inputs.iter().filter(|l| !l.trim().is_empty()) {
        let frames = match codec.decode(input)? {
            Capture::Durations(durations) => phy.decode_durations(durations.into_iter()),
            // Replay the log as if the edges came from the pin interrupt
            Capture::Edges(edges) => {
                for edge in &edges {
                    receiver.on_edge(edge.level, edge.timestamp);
                }
                receiver.close_window().unwrap_or_default()
            }
        };

        println!("-----CAPTURE-----");
        for (i, frame) in frames.iter().enumerate() {
            let status = if Checksum::verify(frame) { "ok" } else { "BAD" };
            println!("frame {}: {} [checksum {}]", i, hex::encode(frame), status);
        }

        match FrameBuffer::from_frames(&frames) {
            Ok(buffer) => match ClimateCommand::try_from(&buffer) {
                Ok(command) => println!("{:?}", command),
                Err(e) => warn!(%e, "frames don't form a valid command"),
            },
            Err(e) => warn!(%e, frames = frames.len(), "incomplete capture"),
        }
        println!("-----END OF CAPTURE-----");
        io::stdout().flush()?;
    }

    Ok(())
}
