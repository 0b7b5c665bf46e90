use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tidysf::io::{Driver, ReadOptions, list_layers, read_sf};

/// Describe a spatial file: driver, layers, rows, CRS, geometry kinds,
/// bounding box and attribute schema.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GeoPackage, GeoJSON or delimited file.
    path: PathBuf,

    /// Layer to describe; the first layer when omitted.
    #[arg(short, long)]
    layer: Option<String>,

    /// X column of a delimited file.
    #[arg(long, requires = "y")]
    x: Option<String>,

    /// Y column of a delimited file.
    #[arg(long, requires = "x")]
    y: Option<String>,

    /// WKT column of a delimited file.
    #[arg(long, conflicts_with = "x")]
    wkt: Option<String>,
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
    let driver = Driver::from_path(&args.path)?;
    let layers = list_layers(&args.path)
        .with_context(|| format!("listing layers of {}", args.path.display()))?;

    let mut options = ReadOptions::default();
    if let Some(layer) = &args.layer {
        options = options.layer(layer.clone());
    }
    if let (Some(x), Some(y)) = (&args.x, &args.y) {
        options = options.coordinates(x.clone(), y.clone());
    }
    if let Some(wkt) = &args.wkt {
        options = options.wkt_column(wkt.clone());
    }
    let collection = read_sf(&args.path, &options)
        .with_context(|| format!("reading {}", args.path.display()))?;

    println!("driver:   {}", driver.name());
    println!("layers:   {}", layers.join(", "));
    println!("features: {}", collection.nrow());
    println!("crs:      {}", collection.crs());
    let kinds: Vec<String> = collection
        .geometry_kinds()
        .iter()
        .map(|kind| format!("{kind:?}"))
        .collect();
    println!("geometry: {} ({})", collection.geometry_column_name(), kinds.join(", "));
    match collection.bounding_box() {
        Some(bbox) => println!(
            "bbox:     xmin {} ymin {} xmax {} ymax {}",
            bbox.min().x,
            bbox.min().y,
            bbox.max().x,
            bbox.max().y
        ),
        None => println!("bbox:     empty"),
    }
    println!("fields:");
    for spec in collection.attributes().schema() {
        println!("  {}: {}", spec.name, spec.column_type.name());
    }
    Ok(())
}
