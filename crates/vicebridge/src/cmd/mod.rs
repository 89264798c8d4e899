use std::time::Duration;

use clap::{Args, Subcommand};
use vicebridge_client::{ConnectionConfig, MemSpace, MonitorClient};
use vicebridge_wire::ProtocolVersion;

use crate::exit::{client_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod checkpoint;
pub mod disasm;
pub mod display;
pub mod exec;
pub mod info;
pub mod mem;
pub mod regs;
pub mod screen;
pub mod snapshot;
pub mod version;

/// Connection parameters shared by every subcommand.
#[derive(Debug, Clone)]
pub struct SessionOpts {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub timeout: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe the monitor and print connection state.
    Info(InfoArgs),
    /// Read memory and print a hex dump.
    Read(ReadArgs),
    /// Write bytes to memory.
    Write(WriteArgs),
    /// Show or set CPU registers.
    Regs(RegsArgs),
    /// Execute one or more instructions.
    Step(StepArgs),
    /// Resume execution.
    Go(GoArgs),
    /// Run until the current subroutine returns.
    Ret(RetArgs),
    /// Reset the machine.
    Reset(ResetArgs),
    /// Manage breakpoints.
    Break(BreakArgs),
    /// Set a memory watchpoint.
    Watch(WatchArgs),
    /// Decode the text screen.
    Screen(ScreenArgs),
    /// Disassemble memory.
    Disasm(DisasmArgs),
    /// Fetch the current display frame.
    Display(DisplayArgs),
    /// Show the active palette.
    Palette(PaletteArgs),
    /// Save or load a machine snapshot (peer-side paths).
    Snapshot(SnapshotArgs),
    /// Autostart a program image (peer-side path).
    Autostart(AutostartArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, session, format),
        Command::Read(args) => mem::read(args, session, format),
        Command::Write(args) => mem::write(args, session, format),
        Command::Regs(args) => regs::run(args, session, format),
        Command::Step(args) => exec::step(args, session, format),
        Command::Go(args) => exec::go(args, session, format),
        Command::Ret(args) => exec::ret(args, session, format),
        Command::Reset(args) => exec::reset(args, session, format),
        Command::Break(args) => checkpoint::run_break(args, session, format),
        Command::Watch(args) => checkpoint::run_watch(args, session, format),
        Command::Screen(args) => screen::run(args, session, format),
        Command::Disasm(args) => disasm::run(args, session, format),
        Command::Display(args) => display::run_display(args, session, format),
        Command::Palette(args) => display::run_palette(args, session, format),
        Command::Snapshot(args) => snapshot::run(args, session, format),
        Command::Autostart(args) => snapshot::autostart(args, session, format),
        Command::Version(args) => version::run(args),
    }
}

/// Build the client from session options and connect it.
pub fn open(session: &SessionOpts) -> CliResult<MonitorClient> {
    let protocol = ProtocolVersion::by_name(&session.protocol).ok_or_else(|| {
        CliError::usage(format!(
            "unknown protocol generation '{}' (expected v1, v2 or v3)",
            session.protocol
        ))
    })?;
    let call_timeout = parse_duration(&session.timeout)?;

    let client = MonitorClient::new(ConnectionConfig {
        host: session.host.clone(),
        port: session.port,
        protocol,
        call_timeout,
        ..ConnectionConfig::default()
    });
    client
        .connect()
        .map_err(|err| client_error("connect failed", err))?;
    Ok(client)
}

/// Parse a 16-bit address: `$d020`, `0xd020` or decimal.
pub fn parse_address(input: &str) -> CliResult<u16> {
    let (digits, radix) = if let Some(hex) = input.strip_prefix('$') {
        (hex, 16)
    } else if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        (hex, 16)
    } else {
        (input, 10)
    };
    u16::from_str_radix(digits, radix)
        .map_err(|_| CliError::usage(format!("invalid address '{input}' (use $hex, 0xhex or decimal, up to $ffff)")))
}

/// Parse a memspace name.
pub fn parse_memspace(input: &str) -> CliResult<MemSpace> {
    input.parse().map_err(CliError::usage)
}

/// Parse durations like `10s`, `500ms` or bare seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[derive(Args, Debug, Default)]
pub struct InfoArgs {}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Start address.
    pub start: String,
    /// End address, inclusive. Defaults to one 256-byte page.
    #[arg(long)]
    pub end: Option<String>,
    /// Memory space: main or drive8..drive11.
    #[arg(long, default_value = "main")]
    pub space: String,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Target address.
    pub addr: String,
    /// Bytes as a hex string, e.g. a9008d20d0.
    pub data: String,
    /// Memory space: main or drive8..drive11.
    #[arg(long, default_value = "main")]
    pub space: String,
}

#[derive(Args, Debug)]
pub struct RegsArgs {
    /// Register assignments like pc=0xc000,a=7. Empty shows registers.
    #[arg(long, value_delimiter = ',')]
    pub set: Vec<String>,
    /// Memory space: main or drive8..drive11.
    #[arg(long, default_value = "main")]
    pub space: String,
}

#[derive(Args, Debug)]
pub struct StepArgs {
    /// Number of instructions.
    #[arg(default_value_t = 1)]
    pub count: u16,
    /// Step over subroutine calls.
    #[arg(long)]
    pub over: bool,
}

#[derive(Args, Debug, Default)]
pub struct GoArgs {}

#[derive(Args, Debug, Default)]
pub struct RetArgs {}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Hard reset (power cycle) instead of a soft reset.
    #[arg(long)]
    pub hard: bool,
}

#[derive(Args, Debug)]
pub struct BreakArgs {
    #[command(subcommand)]
    pub action: BreakAction,
}

#[derive(Subcommand, Debug)]
pub enum BreakAction {
    /// Set an execution breakpoint.
    Set(BreakSetArgs),
    /// Delete a checkpoint by id.
    Delete {
        id: u32,
    },
    /// Enable or disable a checkpoint by id.
    Toggle {
        id: u32,
        /// Disable instead of enable.
        #[arg(long)]
        off: bool,
    },
    /// List locally tracked checkpoints.
    List,
}

#[derive(Args, Debug)]
pub struct BreakSetArgs {
    /// Start address.
    pub start: String,
    /// End address, inclusive. Defaults to the start address.
    #[arg(long)]
    pub end: Option<String>,
    /// One-shot breakpoint, deleted by the peer on first hit.
    #[arg(long)]
    pub temporary: bool,
    /// Create disabled.
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Start address.
    pub start: String,
    /// End address, inclusive. Defaults to the start address.
    #[arg(long)]
    pub end: Option<String>,
    /// Trigger on load, store or loadstore.
    #[arg(long, default_value = "store")]
    pub kind: String,
    /// One-shot watchpoint.
    #[arg(long)]
    pub temporary: bool,
}

#[derive(Args, Debug)]
pub struct ScreenArgs {
    /// Decode with the lowercase character set.
    #[arg(long)]
    pub lowercase: bool,
}

#[derive(Args, Debug)]
pub struct DisasmArgs {
    /// Start address.
    pub start: String,
    /// Number of bytes to fetch.
    #[arg(long, default_value_t = 64)]
    pub length: u16,
}

#[derive(Args, Debug)]
pub struct DisplayArgs {
    /// Request indexed-palette pixels instead of direct color.
    #[arg(long)]
    pub indexed: bool,
    /// Write the raw pixel buffer to a local file.
    #[arg(long, value_name = "FILE")]
    pub save: Option<std::path::PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct PaletteArgs {}

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub action: SnapshotAction,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotAction {
    /// Write a snapshot on the peer side.
    Save { path: String },
    /// Restore a snapshot on the peer side.
    Load { path: String },
}

#[derive(Args, Debug)]
pub struct AutostartArgs {
    /// Program image path, as seen by the peer.
    pub path: String,
    /// Load only; do not run after loading.
    #[arg(long)]
    pub no_run: bool,
    /// Index within a multi-file image.
    #[arg(long, default_value_t = 0)]
    pub index: u16,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
