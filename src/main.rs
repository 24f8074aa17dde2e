use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};
use qm_catalog::{
    BuiltinNumerus, NumerusProvider, QmError, QmResult, ReleaseOptions, SaveMode, decode,
    read_catalog_file, save_catalog,
};
use tracing::info;

fn cli() -> Command {
    Command::new("qmcat")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compile, dump and inspect .qm translation catalogs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("release")
                .about("Compile a .json or .qm catalog into a .qm file")
                .arg(
                    Arg::new("input")
                        .help("Catalog to compile (.json or .qm)")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Path of the .qm file to write")
                        .required(true),
                )
                .arg(
                    Arg::new("compress")
                        .long("compress")
                        .help("Elide fields shared by neighbouring records and add a context table")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("idbased")
                        .long("idbased")
                        .help("Key records by message id")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("markuntranslated")
                        .long("markuntranslated")
                        .value_name("PREFIX")
                        .help("Keep untranslated entries as PREFIX + source text"),
                )
                .arg(
                    Arg::new("nounfinished")
                        .long("nounfinished")
                        .help("Do not include unfinished translations")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("silent")
                        .long("silent")
                        .help("Only report errors")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("verbose"),
                )
                .arg(
                    Arg::new("verbose")
                        .long("verbose")
                        .short('v')
                        .help("Print a summary of what was written")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("dump")
                .about("Decode a .qm file and print it as JSON")
                .arg(Arg::new("file").help(".qm file to decode").required(true).index(1))
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Write the JSON here instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Summarize a .qm file")
                .arg(Arg::new("file").help(".qm file to inspect").required(true).index(1)),
        )
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> QmResult<&'a Path> {
    matches
        .get_one::<String>(name)
        .map(Path::new)
        .ok_or_else(|| QmError::UnsupportedInput(format!("missing argument <{}>", name)))
}

fn release(matches: &ArgMatches) -> QmResult<()> {
    let input = required(matches, "input")?;
    let output = required(matches, "output")?;

    let save_mode = if matches.get_flag("compress") {
        SaveMode::Stripped
    } else {
        SaveMode::Everything
    };
    let prefix = matches
        .get_one::<String>("markuntranslated")
        .map(String::as_str)
        .unwrap_or("");
    let options = ReleaseOptions::new()
        .with_save_mode(save_mode)
        .with_id_based(matches.get_flag("idbased"))
        .with_untranslated_prefix(prefix)
        .with_ignore_unfinished(matches.get_flag("nounfinished"))
        .with_verbose(matches.get_flag("verbose"));

    let catalog = read_catalog_file(input)?;
    if options.verbose {
        info!("Updating '{}'...", output.display());
    }
    let released = save_catalog(&catalog, &options)?;
    fs::write(output, &released.bytes)?;
    if !matches.get_flag("silent") {
        for line in released.report.messages(options.verbose) {
            eprintln!("{}", line);
        }
    }
    Ok(())
}

fn dump(matches: &ArgMatches) -> QmResult<()> {
    let file = required(matches, "file")?;
    let data = fs::read(file)?;
    let decoded = decode(&data, &BuiltinNumerus)?;
    let json = serde_json::to_string_pretty(&decoded.catalog)?;
    match matches.get_one::<String>("output") {
        Some(out) => fs::write(out, json)?,
        None => println!("{}", json),
    }
    Ok(())
}

fn show_info(matches: &ArgMatches) -> QmResult<()> {
    let file = required(matches, "file")?;
    let data = fs::read(file)?;
    let decoded = decode(&data, &BuiltinNumerus)?;
    let catalog = &decoded.catalog;

    let language = if catalog.language_code.is_empty() {
        "(none)"
    } else {
        catalog.language_code.as_str()
    };
    println!("File:          {}", file.display());
    println!("Language:      {}", language);
    if let Some(numerus) = BuiltinNumerus.numerus_info(&catalog.language_code) {
        println!("Plural forms:  {}", numerus.forms);
    }
    println!("Dependencies:  {}", catalog.dependencies.len());
    for dependency in &catalog.dependencies {
        println!("  {}", dependency);
    }
    println!("Messages:      {}", catalog.len());
    println!(
        "Plurals:       {}",
        catalog.entries().iter().filter(|e| e.is_plural).count()
    );
    println!("Rule bytes:    {}", catalog.numerus_rules.len());
    match &decoded.contexts {
        Some(contexts) => println!(
            "Context table: {} buckets, {} contexts",
            contexts.table_size(),
            contexts.names().len()
        ),
        None => println!("Context table: none"),
    }
    Ok(())
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let silent = matches
        .subcommand_matches("release")
        .is_some_and(|m| m.get_flag("silent"));
    let default_level = if silent { "error" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match matches.subcommand() {
        Some(("release", sub)) => release(sub),
        Some(("dump", sub)) => dump(sub),
        Some(("info", sub)) => show_info(sub),
        _ => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("qmcat: {}", e);
            ExitCode::FAILURE
        }
    }
}
