//! Example forwarder binary: wires one input NIC and two output NICs into
//! an agent and runs a flood classifier (forward every frame on every
//! output) in a tight poll loop.

use std::io::IsTerminal;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ixgbe_core::DefaultAgent;
use ixgbe_device::{Ixgbe82599, PciAddr};
use ixgbe_mem::BufferPool;

/// Backing region for the ring and packet buffer allocations. Comfortably
/// covers `DefaultAgent`'s 256-entry rings with room to spare; see
/// `ixgbe_mem::MAX_POOL_SIZE` for the sizing rationale.
const BACKING_SIZE: usize = 8 * 1024 * 1024;

/// This binary demonstrates exactly two outputs; `DefaultAgent`'s const
/// generic carries that count at compile time rather than as a runtime
/// parameter.
type ForwardAgent<'dev> = DefaultAgent<'dev, 2, Ixgbe82599>;

#[derive(Parser)]
#[command(name = "ixgbe-forwardd")]
#[command(about = "Polled, copy-free frame forwarder between 82599 NICs")]
struct Cli {
    /// Bus:device.function of the NIC to receive from (e.g. 01:00.0).
    #[arg(long, value_parser = parse_bdf)]
    input: Bdf,

    /// Bus:device.function of each NIC to forward onto. May be repeated;
    /// the input device's own BDF may appear here too, making it both the
    /// receive queue and output 0's transmit queue.
    #[arg(long = "output", value_parser = parse_bdf, required = true)]
    outputs: Vec<Bdf>,
}

#[derive(Debug, Clone, Copy)]
struct Bdf {
    bus: u8,
    device: u8,
    function: u8,
}

fn parse_bdf(s: &str) -> Result<Bdf, String> {
    let (bus_dev, function) = s.split_once('.').ok_or("expected BB:DD.F")?;
    let (bus, device) = bus_dev.split_once(':').ok_or("expected BB:DD.F")?;
    Ok(Bdf {
        bus: u8::from_str_radix(bus, 16).map_err(|e| e.to_string())?,
        device: u8::from_str_radix(device, 16).map_err(|e| e.to_string())?,
        function: function.parse().map_err(|e: std::num::ParseIntError| e.to_string())?,
    })
}

impl From<Bdf> for PciAddr {
    fn from(bdf: Bdf) -> Self {
        PciAddr::new(bdf.bus, bdf.device, bdf.function)
    }
}

fn main() -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    if !std::io::stderr().is_terminal() {
        builder.format_timestamp_millis();
    }
    builder.init();

    let cli = Cli::parse();
    run(cli)
}

fn open_device(bdf: Bdf) -> Result<Ixgbe82599> {
    let addr: PciAddr = bdf.into();
    let info = unsafe { ixgbe_device::probe(addr) }
        .with_context(|| format!("no 82599 NIC found at {:?}", bdf))?;

    unsafe { ixgbe_device::enable_device(info.addr) };
    let mmio = ixgbe_device::map_bar0(info.addr, info.bar0_size)
        .with_context(|| format!("mapping BAR0 for {:?}", bdf))?;

    let device = unsafe { ixgbe_device::Ixgbe82599::new(mmio) }
        .with_context(|| format!("bringing up {:?}", bdf))?;
    Ok(device)
}

fn run(cli: Cli) -> Result<()> {
    if cli.outputs.is_empty() {
        bail!("at least one --output is required");
    }

    if cli.outputs.len() != 2 {
        bail!("this demo binary is built for exactly two outputs; see DESIGN.md");
    }

    let mut input_device = open_device(cli.input)?;
    let mut out0 = open_device(cli.outputs[0])?;
    let mut out1 = open_device(cli.outputs[1])?;

    let mut backing = vec![0u8; BACKING_SIZE].into_boxed_slice();
    let mut pool = BufferPool::new(&mut backing, identity_translate);

    let mut agent = ForwardAgent::init(&mut pool, &mut input_device, [&mut out0, &mut out1])
        .context("agent initialization failed")?;

    log::info!("forwarding started: {:?} -> {:?}", cli.input, cli.outputs);

    let mut classifier = flood_classifier;
    loop {
        agent.run(&mut classifier);
    }
}

fn identity_translate(ptr: *const u8) -> ixgbe_core::PhysAddr {
    ixgbe_core::PhysAddr(ptr as u64)
}

/// Forward every received frame unchanged on every output.
fn flood_classifier(_packet: &mut [u8], length: u16, outputs: &mut [u16]) {
    for out in outputs.iter_mut() {
        *out = length;
    }
}
