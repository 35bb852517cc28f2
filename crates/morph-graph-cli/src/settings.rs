use clap::Parser;
use geo::Point;
use morph_graph_lib::{
    CenterPoint, Contiguity, Crs, MorphologyConfig, NetworkConfig, Result, TessellationConfig,
    TessellationDistance,
};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Morph Graph - Build morphological graphs (tessellation cells, street segments and their relations) for a synthetic street grid
pub struct Settings {
    /// Number of city blocks along each side of the grid
    #[clap(long, default_value = "3")]
    pub blocks: usize,

    /// Side length of a city block, in CRS units
    #[clap(long, default_value = "100.0")]
    pub block_size: f64,

    /// Buildings along each side of a block (a block holds the square of this)
    #[clap(long, default_value = "2")]
    pub buildings_per_side: usize,

    /// CRS assigned to the generated buildings and streets (e.g. EPSG:3857)
    #[clap(long)]
    pub crs: Option<Crs>,

    /// X coordinate of the network distance center
    #[clap(long, requires = "center_y")]
    pub center_x: Option<f64>,

    /// Y coordinate of the network distance center
    #[clap(long, requires = "center_x")]
    pub center_y: Option<f64>,

    /// Maximum network distance from the center
    #[clap(long)]
    pub distance: Option<f64>,

    /// Adjacency bound between cells and streets: "unlimited", "intersecting" or a distance
    #[clap(long, default_value = "unlimited", value_parser = parse_tessellation_distance)]
    pub tessellation_distance: TessellationDistance,

    /// Contiguity rule between cells ("queen" or "rook")
    #[clap(long, default_value = "queen")]
    pub contiguity: String,

    /// Identifier column of tessellation cells
    #[clap(long)]
    pub private_id_col: Option<String>,

    /// Identifier column of street segments
    #[clap(long)]
    pub public_id_col: Option<String>,

    /// Alternate street geometry column used as barriers
    #[clap(long, default_value = "barrier_geometry")]
    pub barrier_col: String,

    /// Copy building attributes onto their tessellation cells
    #[clap(long, default_value = "false")]
    pub keep_buildings: bool,

    /// Margin around the inputs that closes the outermost enclosures
    #[clap(long, default_value = "100.0")]
    pub extent_margin: f64,

    /// Spacing of the sample points along building boundaries
    #[clap(long, default_value = "0.5")]
    pub segment_length: f64,

    /// Street endpoints closer than this are merged
    #[clap(long, default_value = "1e-6")]
    pub snap_tolerance: f64,

    /// Also merge the result into a single heterogeneous graph and report its size
    #[clap(long, default_value = "false")]
    pub hetero: bool,

    /// Print the summary as JSON
    #[clap(long, default_value = "false")]
    pub json: bool,
}

impl Settings {
    /// Parse the command line, exiting with a usage message on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Library configuration equivalent to these settings
    pub fn to_config(&self) -> Result<MorphologyConfig> {
        let center_point = self
            .center_x
            .zip(self.center_y)
            .map(|(x, y)| CenterPoint::Point(Point::new(x, y)));
        Ok(MorphologyConfig {
            center_point,
            distance: self.distance,
            private_id_col: self.private_id_col.clone(),
            public_id_col: self.public_id_col.clone(),
            tessellation_distance: self.tessellation_distance,
            barrier_col: Some(self.barrier_col.clone()),
            contiguity: self.contiguity.parse::<Contiguity>()?,
            keep_buildings: self.keep_buildings,
            tessellation: TessellationConfig {
                extent_margin: self.extent_margin,
                snap_tolerance: self.snap_tolerance,
                segment_length: self.segment_length,
            },
            network: NetworkConfig {
                snap_tolerance: self.snap_tolerance,
                ..Default::default()
            },
        })
    }
}

fn parse_tessellation_distance(s: &str) -> std::result::Result<TessellationDistance, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "unlimited" | "inf" => Ok(TessellationDistance::Unlimited),
        "intersecting" | "none" => Ok(TessellationDistance::Intersecting),
        other => other
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(TessellationDistance::Within)
            .ok_or_else(|| format!("expected 'unlimited', 'intersecting' or a distance, got '{s}'")),
    }
}
