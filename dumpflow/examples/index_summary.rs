/// Prints a summary of the runtime state reconstructed from an index file
use std::fs::File;
use std::io::BufReader;

use clap::{crate_authors, crate_version, Arg, ArgAction, ArgMatches, Command};
use log::Level;

use dumpflow::prelude::v1::*;

fn main() -> Result<()> {
    let matches = parse_args();
    let (index, image, options) = extract_args(&matches)?;

    let model = reconstruct_with_options(index, image, &options);

    let header = &model.header;
    println!(
        "{} {} ({} bit, {:?}) created {}",
        header.os_name.as_deref().unwrap_or("unknown os"),
        header.cpu_type.as_deref().unwrap_or("unknown cpu"),
        header.pointer_bits,
        header.endianness,
        header
            .creation_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "at an unknown time".to_string())
    );

    if let Some(err) = model.failure {
        println!("index could not be read completely: {}", err);
    }
    if model.repair_stats.repairs() > 0 {
        println!("repairs: {:?}", model.repair_stats);
    }
    for reported in model.reported_errors.iter() {
        println!("reported in <{}>: {}", reported.parent, reported.message);
    }
    for (name, count) in model.unexpected_elements.iter() {
        println!("unexpected <{}> x{}", name, count);
    }

    let process = match model.process() {
        Some(process) => process,
        None => {
            println!("no process matched the index");
            return Ok(());
        }
    };

    println!(
        "process {} ({}) {}",
        process.pid,
        process.id,
        process.command_line.as_deref().unwrap_or("")
    );
    if let Some(fault) = process.fault.as_ref() {
        println!(
            "signal {} on thread {}",
            fault.signal, fault.failing_thread
        );
    }

    println!(
        "{:>18} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "RUNTIME", "CLASSES", "LOADERS", "HEAPS", "OBJECTS", "THREADS", "ROOTS"
    );
    for rt in process.runtimes.iter() {
        println!(
            "{:>18x} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            rt.id,
            rt.classes().len(),
            rt.class_loaders().len(),
            rt.heaps().len(),
            rt.objects().len(),
            rt.threads().len(),
            rt.roots().len()
        );
    }

    Ok(())
}

fn parse_args() -> ArgMatches {
    Command::new("index_summary example")
        .version(crate_version!())
        .author(crate_authors!())
        .arg(Arg::new("verbose").short('v').action(ArgAction::Count))
        .arg(
            Arg::new("index")
                .long("index")
                .short('i')
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new("core")
                .long("core")
                .short('c')
                .action(ArgAction::Set)
                .required(false),
        )
        .arg(
            Arg::new("map")
                .long("map")
                .short('m')
                .action(ArgAction::Set)
                .requires("core")
                .required(false),
        )
        .arg(
            Arg::new("pid")
                .long("pid")
                .short('p')
                .action(ArgAction::Set)
                .default_value("0"),
        )
        .arg(
            Arg::new("process-address")
                .long("process-address")
                .short('a')
                .action(ArgAction::Set)
                .default_value("0x0"),
        )
        .arg(
            Arg::new("args")
                .long("args")
                .short('x')
                .action(ArgAction::Set)
                .default_value(""),
        )
        .get_matches()
}

fn extract_args(
    matches: &ArgMatches,
) -> Result<(BufReader<File>, CoreImage, ReconstructOptions)> {
    let log_level = match matches.get_count("verbose") {
        0 => Level::Error,
        1 => Level::Warn,
        2 => Level::Info,
        3 => Level::Debug,
        4 => Level::Trace,
        _ => Level::Trace,
    };
    simplelog::TermLogger::init(
        log_level.to_level_filter(),
        simplelog::Config::default(),
        simplelog::TerminalMode::Stdout,
        simplelog::ColorChoice::Auto,
    )
    .unwrap();

    let index_path = matches.get_one::<String>("index").unwrap();
    let index = File::open(index_path).map_err(|err| {
        Error(ErrorOrigin::Other, ErrorKind::UnableToReadFile)
            .log_error(format!("{}: {}", index_path, err))
    })?;

    let metadata = SpaceMetadata::new(8, Endianness::Little);
    let memory = match matches.get_one::<String>("core") {
        Some(core) => {
            let mut memory = MappedMemory::open_file(core, metadata)?;
            if let Some(map) = matches.get_one::<String>("map") {
                memory.load_ranges(map)?;
            }
            memory
        }
        None => MappedMemory::from_buffer(Vec::new(), metadata),
    };

    let pid = dumpflow::numeric::decode_long(matches.get_one::<String>("pid").map(String::as_str), 0)?;
    let process_address = dumpflow::numeric::decode_long(
        matches
            .get_one::<String>("process-address")
            .map(String::as_str),
        0,
    )?;

    let image = CoreImage::new(PlatformInfo::new(
        std::env::consts::OS,
        std::env::consts::ARCH,
        8,
        Endianness::Little,
    ))
    .with_space(
        ImageAddressSpace::new("core", Box::new(memory))
            .with_process(ImageProcess::new(pid as u64, Address::from(process_address))),
    );

    let options = ReconstructOptions::from_args(&Args::parse(
        matches.get_one::<String>("args").unwrap(),
    )?)?;

    Ok((BufReader::new(index), image, options))
}
