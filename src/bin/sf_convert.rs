use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tidysf::Crs;
use tidysf::io::{ReadOptions, WriteOptions, read_sf, write_sf};

/// Convert between GeoPackage, GeoJSON and delimited text, optionally
/// reprojecting on the way.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    input: PathBuf,

    output: PathBuf,

    /// Input layer; also names the output layer of a GeoPackage.
    #[arg(short, long)]
    layer: Option<String>,

    /// X column of a delimited input.
    #[arg(long, requires = "y")]
    x: Option<String>,

    /// Y column of a delimited input.
    #[arg(long, requires = "x")]
    y: Option<String>,

    /// WKT column of a delimited input.
    #[arg(long, conflicts_with = "x")]
    wkt: Option<String>,

    /// CRS to assign to the input, e.g. 4326 or "+proj=utm +zone=33".
    #[arg(long)]
    crs: Option<Crs>,

    /// CRS to reproject to before writing.
    #[arg(long)]
    to_crs: Option<Crs>,

    /// Replace an existing output file or layer.
    #[arg(long)]
    overwrite: bool,

    /// Append to an existing output file or layer.
    #[arg(long, conflicts_with = "overwrite")]
    append: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = try_main() {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut read_options = ReadOptions::default();
    if let Some(layer) = &args.layer {
        read_options = read_options.layer(layer.clone());
    }
    if let Some(crs) = &args.crs {
        read_options = read_options.crs(crs.clone());
    }
    if let (Some(x), Some(y)) = (&args.x, &args.y) {
        read_options = read_options.coordinates(x.clone(), y.clone());
    }
    if let Some(wkt) = &args.wkt {
        read_options = read_options.wkt_column(wkt.clone());
    }

    let mut collection = read_sf(&args.input, &read_options)
        .with_context(|| format!("reading {}", args.input.display()))?;
    log::info!(
        "read {} features from {}",
        collection.nrow(),
        args.input.display()
    );

    if let Some(to) = &args.to_crs {
        collection = collection
            .transform(to)
            .with_context(|| format!("reprojecting from {} to {to}", collection.crs()))?;
    }

    let mut write_options = WriteOptions::default()
        .overwrite(args.overwrite)
        .append(args.append);
    if let Some(layer) = &args.layer {
        write_options = write_options.layer(layer.clone());
    }
    write_sf(&collection, &args.output, &write_options)
        .with_context(|| format!("writing {}", args.output.display()))?;
    Ok(())
}
