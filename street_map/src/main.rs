use anyhow::Result;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "street_map", about = "Import an OSM extract into a street map model")]
struct Flags {
    /// OSM XML file to import
    #[structopt(long = "osm")]
    osm: String,

    /// Write the resulting model as JSON here
    #[structopt(long = "output")]
    output: Option<String>,

    /// Skip generating building meshes
    #[structopt(long = "skip_buildings")]
    skip_buildings: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let flags = Flags::from_args();

    let mut opts = street_map::Options::default();
    opts.generate_buildings = !flags.skip_buildings;

    let raw_xml = std::fs::read_to_string(&flags.osm)?;
    let (map, report) = street_map::import(&raw_xml, &opts)?;

    println!(
        "{}: {} intersections, {} roads, {} buildings, {} areas, {} POIs",
        flags.osm,
        map.intersections.len(),
        map.roads.len(),
        map.buildings.len(),
        map.areas.len(),
        map.pois.len()
    );
    println!(
        "skipped elements: {} malformed, {} dangling references, {} degenerate",
        report.malformed_elements(),
        report.dangling_references(),
        report.degenerate_geometry()
    );

    if let Some(path) = flags.output {
        std::fs::write(&path, serde_json::to_string_pretty(&map)?)?;
        println!("wrote {}", path);
    }
    Ok(())
}
