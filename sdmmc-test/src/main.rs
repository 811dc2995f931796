use std::fmt::Debug;

use clap::Parser;
use log::LevelFilter;
use mbr_nostd::{MasterBootRecord, PartitionTable};
use pretty_hex::pretty_hex;
use sdmmc::{bus, bus::linux, CardStatus, SD};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Specify SPI device
    #[clap(short, long, value_parser)]
    spi: String,

    /// Specify chip-select GPIO number
    #[clap(short, long, value_parser)]
    cs: u16,

    /// Card-detect GPIO number, active low
    #[clap(short, long, value_parser)]
    detect: Option<u16>,

    /// SPI clock after initialization, in Hz
    #[clap(long, value_parser, default_value_t = 2_000_000)]
    speed: u32,

    #[clap(long, value_parser, default_value_t = 0)]
    sector: u32,

    #[clap(long, value_parser, default_value_t = 0)]
    offset: usize,

    /// Number of bytes to read
    #[clap(long, value_parser, default_value_t = 512)]
    count: usize,

    /// Repeat for more log output
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn dump<E, BUS>(mut sd: SD<BUS>, args: &Args) -> Result<(), String>
where
    E: Debug,
    BUS: bus::Read<Error = E> + bus::Write<Error = E> + bus::Bus<Error = E>,
{
    let status = sd.initialize().map_err(|e| format!("{:?}", e))?;
    if status == CardStatus::NoDisk {
        return Err("No card in socket".into());
    }
    println!("Card: {:?} {:?}", sd.card(), status);

    let mut buffer = vec![0u8; args.count];
    sd.read_partial_sector(args.sector, args.offset, &mut buffer).map_err(|e| format!("{:?}", e))?;
    println!("{}", pretty_hex(&buffer));

    if args.sector != 0 || args.offset != 0 || args.count != sdmmc::BLOCK_SIZE {
        return Ok(());
    }
    let mbr = MasterBootRecord::from_bytes(&buffer).map_err(|e| format!("{:?}", e))?;
    for partition in mbr.partition_table_entries().iter() {
        println!("{:?}", partition);
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), String> {
    match args.detect {
        Some(detect) => {
            let bus = linux::spi_with_detect(&args.spi, args.cs, detect, args.speed);
            dump(SD::new(bus.map_err(|e| e.to_string())?), args)
        }
        None => {
            let bus = linux::spi(&args.spi, args.cs, args.speed);
            dump(SD::new(bus.map_err(|e| e.to_string())?), args)
        }
    }
}

fn main() {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();
    match run(&args) {
        Ok(_) => (),
        Err(e) => println!("{}", e),
    };
}
