//! Typed builder for xeno-canto search queries.
//!
//! Filters are rendered in the API v3 tag syntax, e.g.
//! `gen:Larus sp:fuscus cnt:"United Kingdom" q:A`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, XcError};

/// A search tag understood by the xeno-canto API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    Genus,
    Species,
    Subspecies,
    Family,
    Group,
    EnglishName,
    Recordist,
    Country,
    Location,
    Area,
    BoundingBox,
    Latitude,
    Longitude,
    Altitude,
    Quality,
    SoundType,
    Sex,
    LifeStage,
    Method,
    Length,
    Year,
    Month,
    Since,
    TimeOfDay,
    License,
    Also,
    AnimalSeen,
    PlaybackUsed,
    NumberInGroup,
    CatalogueNumber,
    Temperature,
    RegistrationNumber,
    Automatic,
    Device,
    Microphone,
    SampleRate,
    Remarks,
}

impl Tag {
    /// The keyword as it appears in the query string.
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Genus => "gen",
            Tag::Species => "sp",
            Tag::Subspecies => "ssp",
            Tag::Family => "fam",
            Tag::Group => "grp",
            Tag::EnglishName => "en",
            Tag::Recordist => "rec",
            Tag::Country => "cnt",
            Tag::Location => "loc",
            Tag::Area => "area",
            Tag::BoundingBox => "box",
            Tag::Latitude => "lat",
            Tag::Longitude => "lon",
            Tag::Altitude => "alt",
            Tag::Quality => "q",
            Tag::SoundType => "type",
            Tag::Sex => "sex",
            Tag::LifeStage => "stage",
            Tag::Method => "method",
            Tag::Length => "len",
            Tag::Year => "year",
            Tag::Month => "month",
            Tag::Since => "since",
            Tag::TimeOfDay => "time",
            Tag::License => "lic",
            Tag::Also => "also",
            Tag::AnimalSeen => "animal-seen",
            Tag::PlaybackUsed => "playback-used",
            Tag::NumberInGroup => "nr",
            Tag::CatalogueNumber => "catnr",
            Tag::Temperature => "temp",
            Tag::RegistrationNumber => "regnr",
            Tag::Automatic => "auto",
            Tag::Device => "dvc",
            Tag::Microphone => "mic",
            Tag::SampleRate => "smp",
            Tag::Remarks => "rmk",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `auto` tag (automatic, non-supervised recording).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Automatic {
    Yes,
    No,
    Unknown,
}

impl Automatic {
    pub fn as_str(self) -> &'static str {
        match self {
            Automatic::Yes => "yes",
            Automatic::No => "no",
            Automatic::Unknown => "unknown",
        }
    }
}

impl FromStr for Automatic {
    type Err = XcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Automatic::Yes),
            "no" => Ok(Automatic::No),
            "unknown" => Ok(Automatic::Unknown),
            other => Err(XcError::config(format!(
                "automatic must be yes, no or unknown, got '{other}'"
            ))),
        }
    }
}

/// Geographic box, rendered as `box:LAT_MIN,LON_MIN,LAT_MAX,LON_MAX`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn new(lat_min: f64, lon_min: f64, lat_max: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lon_min,
            lat_max,
            lon_max,
        }
    }

    /// Check ranges and ordering of the four bounds.
    pub fn validate(&self) -> Result<()> {
        let all = [self.lat_min, self.lon_min, self.lat_max, self.lon_max];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(XcError::config("bounding box values must be finite numbers"));
        }
        for lat in [self.lat_min, self.lat_max] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(XcError::config(format!(
                    "bounding box latitude {lat} outside -90..90"
                )));
            }
        }
        for lon in [self.lon_min, self.lon_max] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(XcError::config(format!(
                    "bounding box longitude {lon} outside -180..180"
                )));
            }
        }
        if self.lat_min > self.lat_max || self.lon_min > self.lon_max {
            return Err(XcError::config(
                "bounding box minimum must not exceed maximum",
            ));
        }
        Ok(())
    }

    fn render(&self) -> String {
        format!(
            "{},{},{},{}",
            self.lat_min, self.lon_min, self.lat_max, self.lon_max
        )
    }
}

/// Parse `"lat_min,lon_min,lat_max,lon_max"`.
impl FromStr for BoundingBox {
    type Err = XcError;

    fn from_str(s: &str) -> Result<Self> {
        let coords = s
            .split(',')
            .map(|part| {
                part.trim().parse::<f64>().map_err(|_| {
                    XcError::config(format!("invalid bounding box coordinate '{}'", part.trim()))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        match coords.as_slice() {
            [a, b, c, d] => Ok(BoundingBox::new(*a, *b, *c, *d)),
            _ => Err(XcError::config(format!(
                "bounding box needs 4 coordinates, got {}",
                coords.len()
            ))),
        }
    }
}

/// A rendered, validated query. Built once and handed to the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    tags: Vec<(Tag, String)>,
    rendered: String,
}

impl Query {
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Tag/value pairs in render order.
    pub fn tags(&self) -> impl Iterator<Item = (Tag, &str)> {
        self.tags.iter().map(|(t, v)| (*t, v.as_str()))
    }

    /// Value set for `tag`, if any.
    pub fn get(&self, tag: Tag) -> Option<&str> {
        self.tags
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Chainable builder; each setter records one provider tag.
///
/// Setting the same filter twice keeps the last value (in the position of
/// the first). Empty values leave the filter unset.
///
/// ```
/// use xc_lib::QueryBuilder;
///
/// let query = QueryBuilder::new()
///     .genus("Larus")
///     .species("fuscus")
///     .quality("A")
///     .build()
///     .unwrap();
/// assert_eq!(query.as_str(), "gen:Larus sp:fuscus q:A");
/// ```
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    tags: Vec<(Tag, String)>,
    bounding_box: Option<BoundingBox>,
    box_error: Option<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary tag. The typed setters below all go through here.
    pub fn tag(mut self, tag: Tag, value: impl Into<String>) -> Self {
        let value = value.into();
        let mut value = value.trim().to_string();
        if value.is_empty() {
            return self;
        }
        if tag == Tag::BoundingBox {
            match value.parse::<BoundingBox>() {
                Ok(bbox) => {
                    value = bbox.render();
                    self.bounding_box = Some(bbox);
                    self.box_error = None;
                }
                Err(e) => {
                    self.bounding_box = None;
                    self.box_error = Some(match e {
                        XcError::Configuration(msg) => msg,
                        other => other.to_string(),
                    });
                }
            }
        }
        match self.tags.iter_mut().find(|(t, _)| *t == tag) {
            Some(slot) => slot.1 = value,
            None => self.tags.push((tag, value)),
        }
        self
    }

    pub fn genus(self, genus: &str) -> Self {
        self.tag(Tag::Genus, genus)
    }

    /// Specific epithet, or a full species name.
    pub fn species(self, species: &str) -> Self {
        self.tag(Tag::Species, species)
    }

    pub fn subspecies(self, subspecies: &str) -> Self {
        self.tag(Tag::Subspecies, subspecies)
    }

    pub fn family(self, family: &str) -> Self {
        self.tag(Tag::Family, family)
    }

    /// Taxonomic group: birds, grasshoppers, bats, frogs, "land mammals".
    pub fn group(self, group: &str) -> Self {
        self.tag(Tag::Group, group)
    }

    pub fn english_name(self, name: &str) -> Self {
        self.tag(Tag::EnglishName, name)
    }

    pub fn recordist(self, name: &str) -> Self {
        self.tag(Tag::Recordist, name)
    }

    pub fn country(self, country: &str) -> Self {
        self.tag(Tag::Country, country)
    }

    pub fn location(self, location: &str) -> Self {
        self.tag(Tag::Location, location)
    }

    /// Continent or region, e.g. `europe`, `"north america"`.
    pub fn area(self, area: &str) -> Self {
        self.tag(Tag::Area, area)
    }

    pub fn bounding_box(self, lat_min: f64, lon_min: f64, lat_max: f64, lon_max: f64) -> Self {
        let bbox = BoundingBox::new(lat_min, lon_min, lat_max, lon_max);
        self.tag(Tag::BoundingBox, bbox.render())
    }

    pub fn with_box(self, bbox: BoundingBox) -> Self {
        self.bounding_box(bbox.lat_min, bbox.lon_min, bbox.lat_max, bbox.lon_max)
    }

    /// Latitude or range, e.g. `40-45`, `>50`.
    pub fn latitude(self, latitude: &str) -> Self {
        self.tag(Tag::Latitude, latitude)
    }

    pub fn longitude(self, longitude: &str) -> Self {
        self.tag(Tag::Longitude, longitude)
    }

    /// Altitude in metres, e.g. `100-500`, `<1000`.
    pub fn altitude(self, altitude: &str) -> Self {
        self.tag(Tag::Altitude, altitude)
    }

    /// Quality rating `A`..`E`, optionally with an operator such as `>B`.
    pub fn quality(self, quality: &str) -> Self {
        self.tag(Tag::Quality, quality)
    }

    pub fn sound_type(self, sound_type: &str) -> Self {
        self.tag(Tag::SoundType, sound_type)
    }

    pub fn sex(self, sex: &str) -> Self {
        self.tag(Tag::Sex, sex)
    }

    pub fn life_stage(self, stage: &str) -> Self {
        self.tag(Tag::LifeStage, stage)
    }

    pub fn method(self, method: &str) -> Self {
        self.tag(Tag::Method, method)
    }

    /// Length in seconds, e.g. `10-20`, `<30`.
    pub fn length(self, length: &str) -> Self {
        self.tag(Tag::Length, length)
    }

    /// Year or range, e.g. `2020`, `2015-2020`, `>2018`.
    pub fn year(self, year: &str) -> Self {
        self.tag(Tag::Year, year)
    }

    pub fn month(self, month: &str) -> Self {
        self.tag(Tag::Month, month)
    }

    /// Uploaded within the last `days` days.
    pub fn since(self, days: u32) -> Self {
        self.tag(Tag::Since, days.to_string())
    }

    /// `HH:MM` or a range such as `06:00-12:00`.
    pub fn time_of_day(self, time: &str) -> Self {
        self.tag(Tag::TimeOfDay, time)
    }

    pub fn license(self, license: &str) -> Self {
        self.tag(Tag::License, license)
    }

    /// Background species.
    pub fn also(self, species: &str) -> Self {
        self.tag(Tag::Also, species)
    }

    pub fn animal_seen(self, seen: bool) -> Self {
        self.tag(Tag::AnimalSeen, yes_no(seen))
    }

    pub fn playback_used(self, used: bool) -> Self {
        self.tag(Tag::PlaybackUsed, yes_no(used))
    }

    /// Number of individuals, e.g. `1`, `2-5`, `>10`.
    pub fn number_in_group(self, number: &str) -> Self {
        self.tag(Tag::NumberInGroup, number)
    }

    pub fn catalogue_number(self, number: &str) -> Self {
        self.tag(Tag::CatalogueNumber, number)
    }

    pub fn temperature(self, temp: &str) -> Self {
        self.tag(Tag::Temperature, temp)
    }

    pub fn registration_number(self, regnr: &str) -> Self {
        self.tag(Tag::RegistrationNumber, regnr)
    }

    pub fn automatic_recording(self, auto: Automatic) -> Self {
        self.tag(Tag::Automatic, auto.as_str())
    }

    pub fn device(self, device: &str) -> Self {
        self.tag(Tag::Device, device)
    }

    pub fn microphone(self, microphone: &str) -> Self {
        self.tag(Tag::Microphone, microphone)
    }

    /// Sample rate in Hz, e.g. `44100`, `>44100`.
    pub fn sample_rate(self, rate: &str) -> Self {
        self.tag(Tag::SampleRate, rate)
    }

    pub fn remarks(self, remarks: &str) -> Self {
        self.tag(Tag::Remarks, remarks)
    }

    /// Validate and render.
    pub fn build(self) -> Result<Query> {
        if self.tags.is_empty() {
            return Err(XcError::config("no search filters specified"));
        }
        if let Some(msg) = self.box_error {
            return Err(XcError::config(msg));
        }
        if let Some(bbox) = &self.bounding_box {
            bbox.validate()?;
        }
        if let Some((tag, _)) = self.tags.iter().find(|(_, v)| v.contains('"')) {
            return Err(XcError::config(format!(
                "value for '{tag}' must not contain a double quote"
            )));
        }

        let rendered = self
            .tags
            .iter()
            .map(|(tag, value)| render_tag(*tag, value))
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Query {
            tags: self.tags,
            rendered,
        })
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn render_tag(tag: Tag, value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("{tag}:\"{value}\"")
    } else {
        format!("{tag}:{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_tags_in_order() {
        let q = QueryBuilder::new()
            .group("birds")
            .country("Spain")
            .quality("A")
            .build()
            .unwrap();
        assert_eq!(q.as_str(), "grp:birds cnt:Spain q:A");
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn quotes_multi_word_values() {
        let q = QueryBuilder::new()
            .country("United Kingdom")
            .sound_type("alarm call")
            .genus("Larus")
            .build()
            .unwrap();
        assert_eq!(q.as_str(), r#"cnt:"United Kingdom" type:"alarm call" gen:Larus"#);
    }

    #[test]
    fn ranges_and_operators_pass_through() {
        let q = QueryBuilder::new()
            .altitude("1000-2000")
            .year(">2023")
            .length("<30")
            .longitude("-10-0")
            .build()
            .unwrap();
        assert_eq!(q.as_str(), "alt:1000-2000 year:>2023 len:<30 lon:-10-0");
        assert_eq!(q.get(Tag::Altitude), Some("1000-2000"));
    }

    #[test]
    fn booleans_render_yes_no() {
        let q = QueryBuilder::new()
            .animal_seen(true)
            .playback_used(false)
            .automatic_recording(Automatic::Unknown)
            .build()
            .unwrap();
        assert_eq!(q.as_str(), "animal-seen:yes playback-used:no auto:unknown");
    }

    #[test]
    fn last_write_wins_in_first_position() {
        let q = QueryBuilder::new()
            .genus("Larus")
            .quality("B")
            .genus("Parus")
            .build()
            .unwrap();
        assert_eq!(q.as_str(), "gen:Parus q:B");
        assert_eq!(q.tags().filter(|(t, _)| *t == Tag::Genus).count(), 1);
    }

    #[test]
    fn empty_values_are_ignored() {
        let q = QueryBuilder::new().genus("  ").species("fuscus").build().unwrap();
        assert_eq!(q.as_str(), "sp:fuscus");
    }

    #[test]
    fn empty_query_is_rejected() {
        let err = QueryBuilder::new().build().unwrap_err();
        assert!(matches!(err, XcError::Configuration(_)));
    }

    #[test]
    fn embedded_quote_is_rejected() {
        let err = QueryBuilder::new().remarks("said \"hi\"").build().unwrap_err();
        assert!(matches!(err, XcError::Configuration(_)));
    }

    #[test]
    fn bounding_box_is_one_compound_tag() {
        let q = QueryBuilder::new()
            .bounding_box(40.0, -5.5, 45.25, 3.0)
            .build()
            .unwrap();
        assert_eq!(q.as_str(), "box:40,-5.5,45.25,3");
    }

    #[test]
    fn bounding_box_out_of_range_fails_at_build() {
        let err = QueryBuilder::new()
            .bounding_box(-95.0, 0.0, 10.0, 10.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, XcError::Configuration(_)));

        let err = QueryBuilder::new()
            .bounding_box(50.0, 0.0, 10.0, 10.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, XcError::Configuration(_)));
    }

    #[test]
    fn bounding_box_from_str() {
        let bbox: BoundingBox = "40, -5.5, 45.25, 3".parse().unwrap();
        assert_eq!(bbox, BoundingBox::new(40.0, -5.5, 45.25, 3.0));
        assert!("1,2,3".parse::<BoundingBox>().is_err());
        assert!("1,2,x,4".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn raw_box_tag_is_validated() {
        let err = QueryBuilder::new()
            .tag(Tag::BoundingBox, "garbage")
            .build()
            .unwrap_err();
        assert!(matches!(err, XcError::Configuration(_)));

        let err = QueryBuilder::new()
            .tag(Tag::BoundingBox, "10,0,95,10")
            .build()
            .unwrap_err();
        assert!(matches!(err, XcError::Configuration(_)));

        let q = QueryBuilder::new()
            .tag(Tag::BoundingBox, "garbage")
            .tag(Tag::BoundingBox, "40, -5.5, 45.25, 3")
            .build()
            .unwrap();
        assert_eq!(q.as_str(), "box:40,-5.5,45.25,3");
    }

    #[test]
    fn automatic_from_str() {
        assert_eq!("YES".parse::<Automatic>().unwrap(), Automatic::Yes);
        assert!("maybe".parse::<Automatic>().is_err());
    }

    #[test]
    fn since_renders_days() {
        let q = QueryBuilder::new().group("birds").since(30).build().unwrap();
        assert_eq!(q.to_string(), "grp:birds since:30");
    }
}
