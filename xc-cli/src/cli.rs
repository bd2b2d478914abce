use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use xc_lib::{Automatic, BoundingBox, Query, QueryBuilder, XcError, XC_GROUPS};

#[derive(Parser, Debug)]
#[command(
    name = "xc-dl",
    version,
    about = "Search and download recordings from xeno-canto API v3",
    after_help = "Examples:\n  \
        xc-dl download --grp birds --cnt Spain --type song --q A\n  \
        xc-dl download --gen Larus --sp fuscus --output-dir ./gulls\n  \
        xc-dl count --grp grasshoppers --area europe\n\n\
        The API key is read from --key, the stored key (`xc-dl key set`),\n\
        XC_API_KEY or XENO_CANTO_API_KEY (a .env file is honoured)."
)]
pub struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search and download matching recordings plus metadata.csv
    Download {
        #[command(flatten)]
        filters: FilterArgs,

        /// Output directory
        #[arg(long, alias = "output_dir", default_value = "./xc_downloads")]
        output_dir: PathBuf,

        /// Write metadata.csv only, no audio
        #[arg(long, alias = "metadata_only")]
        metadata_only: bool,

        /// Re-download files that already exist
        #[arg(long)]
        no_skip_existing: bool,

        /// Stop after this many recordings
        #[arg(long, alias = "max_results", value_parser = clap::value_parser!(u64).range(1..))]
        max_results: Option<u64>,

        /// Results per page (50-500)
        #[arg(long, alias = "per_page", default_value_t = xc_lib::api::DEFAULT_PER_PAGE)]
        per_page: u32,

        /// API key (overrides stored key and XC_API_KEY)
        #[arg(long, alias = "api_key")]
        key: Option<String>,
    },
    /// Print how many recordings and species match, without downloading
    Count {
        #[command(flatten)]
        filters: FilterArgs,

        /// API key (overrides stored key and XC_API_KEY)
        #[arg(long, alias = "api_key")]
        key: Option<String>,
    },
    /// Summarise what an output directory already holds
    Info {
        /// Output directory
        #[arg(long, alias = "output_dir", default_value = "./xc_downloads")]
        output_dir: PathBuf,
    },
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum KeyAction {
    /// Store an API key for later runs
    Set { key: String },
    /// Show where the key comes from (masked)
    Show,
    /// Remove the stored key
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    fn as_bool(self) -> bool {
        self == YesNo::Yes
    }
}

/// One flag per search tag.
#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    // Taxonomy
    /// Genus name
    #[arg(long, alias = "genus", help_heading = "Taxonomic filters")]
    pub gen: Option<String>,
    /// Species name
    #[arg(long, alias = "species", help_heading = "Taxonomic filters")]
    pub sp: Option<String>,
    /// Subspecies name
    #[arg(long, alias = "subspecies", help_heading = "Taxonomic filters")]
    pub ssp: Option<String>,
    /// Family name
    #[arg(long, alias = "family", help_heading = "Taxonomic filters")]
    pub fam: Option<String>,
    /// Group: bats, birds, frogs, grasshoppers, "land mammals"
    #[arg(long, alias = "group", help_heading = "Taxonomic filters")]
    pub grp: Option<String>,
    /// English common name
    #[arg(long, alias = "english", help_heading = "Taxonomic filters")]
    pub en: Option<String>,

    // Geography
    /// Country name
    #[arg(long, alias = "country", help_heading = "Geographic filters")]
    pub cnt: Option<String>,
    /// Location/locality name
    #[arg(long, alias = "location", help_heading = "Geographic filters")]
    pub loc: Option<String>,
    /// Continent/region (e.g. europe, asia, africa)
    #[arg(long, help_heading = "Geographic filters")]
    pub area: Option<String>,
    /// Bounding box as LAT_MIN,LON_MIN,LAT_MAX,LON_MAX
    #[arg(long = "box", value_name = "BOX", allow_hyphen_values = true, help_heading = "Geographic filters")]
    pub bbox: Option<BoundingBox>,
    /// Latitude or range (e.g. 40-45, >50)
    #[arg(long, alias = "latitude", allow_hyphen_values = true, help_heading = "Geographic filters")]
    pub lat: Option<String>,
    /// Longitude or range (e.g. -10-0, <-100)
    #[arg(long, alias = "longitude", allow_hyphen_values = true, help_heading = "Geographic filters")]
    pub lon: Option<String>,
    /// Altitude in metres (e.g. 100-500, <1000)
    #[arg(long, alias = "altitude", help_heading = "Geographic filters")]
    pub alt: Option<String>,

    // Quality and type
    /// Quality rating (A-E, or with operators like >B)
    #[arg(long, alias = "quality", help_heading = "Quality and type filters")]
    pub q: Option<String>,
    /// Sound type (song, call, ...)
    #[arg(long = "type", help_heading = "Quality and type filters")]
    pub sound_type: Option<String>,
    /// Sex (male, female, uncertain)
    #[arg(long, help_heading = "Quality and type filters")]
    pub sex: Option<String>,
    /// Life stage (adult, juvenile, ...)
    #[arg(long, help_heading = "Quality and type filters")]
    pub stage: Option<String>,
    /// Recording method
    #[arg(long, help_heading = "Quality and type filters")]
    pub method: Option<String>,

    // Time
    /// Year or range (e.g. 2020, 2015-2020, >2018)
    #[arg(long, help_heading = "Time filters")]
    pub year: Option<String>,
    /// Month or range (1-12)
    #[arg(long, help_heading = "Time filters")]
    pub month: Option<String>,
    /// Uploaded in the last N days
    #[arg(long, help_heading = "Time filters")]
    pub since: Option<u32>,
    /// Time of day (e.g. 06:00, 06:00-12:00)
    #[arg(long, help_heading = "Time filters")]
    pub time: Option<String>,

    // Other
    /// Recordist name
    #[arg(long, alias = "recordist", help_heading = "Other filters")]
    pub rec: Option<String>,
    /// Length in seconds (e.g. 10-20, <30, >60)
    #[arg(long = "len", alias = "length", help_heading = "Other filters")]
    pub length: Option<String>,
    /// License type
    #[arg(long, alias = "license", help_heading = "Other filters")]
    pub lic: Option<String>,
    /// Background species
    #[arg(long, help_heading = "Other filters")]
    pub also: Option<String>,
    /// Was the animal seen?
    #[arg(long, alias = "animal_seen", value_enum, help_heading = "Other filters")]
    pub animal_seen: Option<YesNo>,
    /// Was playback used?
    #[arg(long, alias = "playback_used", value_enum, help_heading = "Other filters")]
    pub playback_used: Option<YesNo>,

    // Recording metadata
    /// Number of individuals (e.g. 1, 2-5, >10)
    #[arg(long, alias = "number", help_heading = "Recording metadata filters")]
    pub nr: Option<String>,
    /// Catalogue number (e.g. 12345, >100000)
    #[arg(long, help_heading = "Recording metadata filters")]
    pub catnr: Option<String>,
    /// Temperature (e.g. 20-30, <10)
    #[arg(long, alias = "temperature", allow_hyphen_values = true, help_heading = "Recording metadata filters")]
    pub temp: Option<String>,
    /// Specimen registration number
    #[arg(long, help_heading = "Recording metadata filters")]
    pub regnr: Option<String>,
    /// Automatic (non-supervised) recording: yes, no, unknown
    #[arg(long, alias = "automatic", help_heading = "Recording metadata filters")]
    pub auto: Option<Automatic>,
    /// Recording device
    #[arg(long, alias = "device", help_heading = "Recording metadata filters")]
    pub dvc: Option<String>,
    /// Microphone
    #[arg(long, alias = "microphone", help_heading = "Recording metadata filters")]
    pub mic: Option<String>,
    /// Sample rate (e.g. 44100, >44100)
    #[arg(long, alias = "sample_rate", help_heading = "Recording metadata filters")]
    pub smp: Option<String>,
    /// Search the remarks field
    #[arg(long, alias = "remarks", help_heading = "Recording metadata filters")]
    pub rmk: Option<String>,
}

impl FilterArgs {
    /// Apply every flag that was given to a query builder and build it.
    pub fn to_query(&self) -> Result<Query, XcError> {
        if let Some(group) = &self.grp {
            if !XC_GROUPS.iter().any(|g| g.eq_ignore_ascii_case(group.trim())) {
                return Err(XcError::config(format!(
                    "unknown group '{group}'. Available: {}",
                    XC_GROUPS.join(", ")
                )));
            }
        }

        let mut b = QueryBuilder::new();

        let text_filters: [(&Option<String>, fn(QueryBuilder, &str) -> QueryBuilder); 32] = [
            (&self.gen, QueryBuilder::genus),
            (&self.sp, QueryBuilder::species),
            (&self.ssp, QueryBuilder::subspecies),
            (&self.fam, QueryBuilder::family),
            (&self.grp, QueryBuilder::group),
            (&self.en, QueryBuilder::english_name),
            (&self.cnt, QueryBuilder::country),
            (&self.loc, QueryBuilder::location),
            (&self.area, QueryBuilder::area),
            (&self.lat, QueryBuilder::latitude),
            (&self.lon, QueryBuilder::longitude),
            (&self.alt, QueryBuilder::altitude),
            (&self.q, QueryBuilder::quality),
            (&self.sound_type, QueryBuilder::sound_type),
            (&self.sex, QueryBuilder::sex),
            (&self.stage, QueryBuilder::life_stage),
            (&self.method, QueryBuilder::method),
            (&self.year, QueryBuilder::year),
            (&self.month, QueryBuilder::month),
            (&self.time, QueryBuilder::time_of_day),
            (&self.rec, QueryBuilder::recordist),
            (&self.length, QueryBuilder::length),
            (&self.lic, QueryBuilder::license),
            (&self.also, QueryBuilder::also),
            (&self.nr, QueryBuilder::number_in_group),
            (&self.catnr, QueryBuilder::catalogue_number),
            (&self.temp, QueryBuilder::temperature),
            (&self.regnr, QueryBuilder::registration_number),
            (&self.dvc, QueryBuilder::device),
            (&self.mic, QueryBuilder::microphone),
            (&self.smp, QueryBuilder::sample_rate),
            (&self.rmk, QueryBuilder::remarks),
        ];
        for (value, set) in text_filters {
            if let Some(v) = value {
                b = set(b, v);
            }
        }

        if let Some(bbox) = self.bbox {
            b = b.with_box(bbox);
        }
        if let Some(days) = self.since {
            b = b.since(days);
        }
        if let Some(seen) = self.animal_seen {
            b = b.animal_seen(seen.as_bool());
        }
        if let Some(used) = self.playback_used {
            b = b.playback_used(used.as_bool());
        }
        if let Some(auto) = self.auto {
            b = b.automatic_recording(auto);
        }

        b.build()
    }
}
