use std::{process::ExitCode, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use log::error;
use urs485_control::{
    BusConfig, ObjectValue, PortChanges, PortConfig, PortTelemetry, ScanOutcome, ScanReport,
    Scanner, Switch, TcpBus, config::DEFAULT_PORT_BASE, ports,
};

/// Configure and inspect a Modbus/TCP managed RS-485 switch
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Host name or address of the switch
    #[clap(long, default_value = "localhost")]
    host: String,

    /// TCP port of the management bus; port N's gateway listens on this plus N
    #[clap(long, default_value_t = DEFAULT_PORT_BASE)]
    port_base: u16,

    /// Management request timeout in milliseconds
    #[clap(long, default_value = "1000")]
    timeout_ms: u64,

    /// Gateway request timeout in milliseconds
    #[clap(long, default_value = "5000")]
    gateway_timeout_ms: u64,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show port configuration
    Config {
        /// Ports such as "1,3-5" (default: all)
        ports: Option<String>,
    },
    /// Change port configuration
    Set {
        /// Ports such as "1,3-5" or "all"
        ports: String,
        /// Baud rate, a multiple of 100 between 1200 and 115200
        #[clap(long)]
        baud: Option<u32>,
        /// none, odd or even
        #[clap(long)]
        parity: Option<String>,
        /// 0 or 1
        #[clap(long)]
        power: Option<u16>,
        /// Device reply timeout in milliseconds
        #[clap(long)]
        timeout: Option<u32>,
        /// Up to 8 ASCII characters
        #[clap(long)]
        description: Option<String>,
    },
    /// Show port configuration and counters
    Stats {
        /// Ports such as "1,3-5" (default: all)
        ports: Option<String>,
    },
    /// Clear port counters
    Reset {
        /// Ports such as "1,3-5" or "all"
        ports: String,
    },
    /// Identify the devices on one port's bus
    Scan {
        /// Serial port whose gateway to use
        port: u8,
        /// Device addresses such as "1-16" (default: 1-247)
        #[clap(long)]
        addresses: Option<String>,
    },
}

fn main() -> ExitCode {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every port or address was handled without error.
fn run(args: Args) -> anyhow::Result<bool> {
    let config = BusConfig {
        host: args.host,
        port_base: args.port_base,
        management_timeout: Duration::from_millis(args.timeout_ms),
        gateway_timeout: Duration::from_millis(args.gateway_timeout_ms),
    };

    match args.command {
        Command::Config { ports } => {
            let ports = ports::parse_ports(ports.as_deref(), true)?;
            let mut switch = connect_management(&config)?;
            Ok(report(switch.for_ports(&ports, Switch::read_config), print_config))
        }
        Command::Set {
            ports,
            baud,
            parity,
            power,
            timeout,
            description,
        } => {
            let ports = ports::parse_ports(Some(&ports), false)?;
            let mut builder = PortChanges::builder();
            if let Some(baud) = baud {
                builder = builder.baud(baud);
            }
            if let Some(parity) = parity {
                builder = builder.parity(parity);
            }
            if let Some(power) = power {
                builder = builder.power(power);
            }
            if let Some(timeout) = timeout {
                builder = builder.timeout_ms(timeout);
            }
            if let Some(description) = description {
                builder = builder.description(description);
            }
            let changes = builder.build()?;
            anyhow::ensure!(!changes.is_empty(), "nothing to set");

            let mut switch = connect_management(&config)?;
            let results = switch.for_ports(&ports, |switch, port| switch.write_config(port, &changes));
            Ok(report(results, |port, ()| println!("port {port}: ok")))
        }
        Command::Stats { ports } => {
            let ports = ports::parse_ports(ports.as_deref(), true)?;
            let mut switch = connect_management(&config)?;
            Ok(report(switch.for_ports(&ports, Switch::read_telemetry), print_telemetry))
        }
        Command::Reset { ports } => {
            let ports = ports::parse_ports(Some(&ports), false)?;
            let mut switch = connect_management(&config)?;
            Ok(report(switch.for_ports(&ports, Switch::reset_counters), |port, ()| {
                println!("port {port}: counters cleared")
            }))
        }
        Command::Scan { port, addresses } => {
            anyhow::ensure!(
                ports::SWITCH_PORTS.contains(&port),
                "port {port} is outside 1-8"
            );
            let addresses =
                ports::parse_selection(addresses.as_deref(), ports::DEVICE_ADDRESSES, true)?;
            let peer = config.gateway_addr(port)?;
            let bus = TcpBus::connect(peer, config.gateway_timeout)
                .with_context(|| format!("connecting to the gateway of port {port} at {peer}"))?;

            let mut ok = true;
            Scanner::new(bus).scan_with(addresses, |report| {
                ok &= !matches!(report.outcome, ScanOutcome::Failed(_));
                print_scan(&report);
            });
            Ok(ok)
        }
    }
}

fn connect_management(config: &BusConfig) -> anyhow::Result<Switch<TcpBus>> {
    let peer = config.management_addr()?;
    let bus = TcpBus::connect(peer, config.management_timeout)
        .with_context(|| format!("connecting to the management bus at {peer}"))?;
    Ok(Switch::new(bus))
}

/// Print every success with `show` and every failure to stderr.
fn report<T>(
    results: Vec<(u8, urs485_control::Result<T>)>,
    mut show: impl FnMut(u8, T),
) -> bool {
    let mut ok = true;
    for (port, result) in results {
        match result {
            Ok(value) => show(port, value),
            Err(err) => {
                eprintln!("port {port}: {err}");
                ok = false;
            }
        }
    }
    ok
}

fn print_config(port: u8, config: PortConfig) {
    println!(
        "port {port}: {} baud, parity {}, power {}, timeout {} ms, description {:?}",
        config.baud,
        config.parity,
        config.power,
        config.timeout.to_millis(),
        config.description.as_str()
    );
}

fn print_telemetry(port: u8, telemetry: PortTelemetry) {
    let counters = telemetry.counters;
    print_config(port, telemetry.config);
    println!("  current sense    {}", if counters.current_sense { "yes" } else { "no" });
    println!("  broadcasts       {}", counters.broadcasts);
    println!("  unicasts         {}", counters.unicasts);
    println!("  frame errors     {}", counters.frame_errors);
    println!("  oversize errors  {}", counters.oversize_errors);
    println!("  undersize errors {}", counters.undersize_errors);
    println!("  crc errors       {}", counters.crc_errors);
    println!("  mismatch errors  {}", counters.mismatch_errors);
    println!("  timeouts         {}", counters.timeouts);
}

fn print_scan(report: &ScanReport) {
    let address = report.address;
    match &report.outcome {
        // Empty addresses are the common case; keep the listing to what answered.
        ScanOutcome::Absent | ScanOutcome::Unreachable => {}
        ScanOutcome::Failed(err) => eprintln!("{address}: {err}"),
        ScanOutcome::IdentificationUnsupported(code) => {
            println!("{address}: present, no identification ({code})")
        }
        ScanOutcome::UnsupportedConformity(level) => {
            println!("{address}: present, unsupported conformity level {level}")
        }
        ScanOutcome::Identified(identification) => {
            println!(
                "{address}: {} identification{}",
                identification.level,
                if identification.streaming { ", streaming" } else { "" }
            );
            for (id, value) in &identification.objects {
                match value {
                    ObjectValue::Text(text) => println!("  {id:#04x}: {text}"),
                    ObjectValue::Undecodable(_) => println!("  {id:#04x}: {value}"),
                }
            }
            for read_code in &identification.incomplete {
                println!("  ({read_code} objects incomplete)");
            }
        }
    }
}
