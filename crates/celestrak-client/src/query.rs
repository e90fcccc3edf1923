//! Query construction for the GP endpoints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::QueryError;

/// Path prefix shared by every GP endpoint.
const ELEMENTS_PATH: &str = "/NORAD/elements/";

/// Query parameter carrying the output format.
const FORMAT_PARAM: &str = "FORMAT";

/// Special dataset tokens accepted by the `SPECIAL` selector.
pub mod special {
    /// GEO protected zone.
    pub const GPZ: &str = "GPZ";
    /// GEO protected zone plus.
    pub const GPZ_PLUS: &str = "GPZ-PLUS";
    /// Objects expected to decay soon.
    pub const DECAYING: &str = "DECAYING";
}

/// Output format of the returned element sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Format {
    /// Two-line element sets with a name line.
    #[default]
    #[serde(rename = "TLE")]
    Tle,
    /// Three-line element sets (name line prefixed with `0 `).
    #[serde(rename = "3LE")]
    ThreeLe,
    /// Bare two-line element sets.
    #[serde(rename = "2LE")]
    TwoLe,
    /// CCSDS OMM XML.
    #[serde(rename = "XML")]
    Xml,
    /// CCSDS OMM keyword-value notation.
    #[serde(rename = "KVN")]
    Kvn,
    /// OMM as JSON.
    #[serde(rename = "JSON")]
    Json,
    /// OMM as indented JSON.
    #[serde(rename = "JSON-PRETTY")]
    JsonPretty,
    /// OMM as CSV.
    #[serde(rename = "CSV")]
    Csv,
}

impl Format {
    /// Every format, in wire-token order.
    pub const ALL: [Format; 8] = [
        Format::Tle,
        Format::ThreeLe,
        Format::TwoLe,
        Format::Xml,
        Format::Kvn,
        Format::Json,
        Format::JsonPretty,
        Format::Csv,
    ];

    /// The `FORMAT` parameter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Tle => "TLE",
            Format::ThreeLe => "3LE",
            Format::TwoLe => "2LE",
            Format::Xml => "XML",
            Format::Kvn => "KVN",
            Format::Json => "JSON",
            Format::JsonPretty => "JSON-PRETTY",
            Format::Csv => "CSV",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Format::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| QueryError::new(format!("unknown format: {token}")))
    }
}

impl TryFrom<String> for Format {
    type Error = QueryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One of the fixed GP endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Current element sets (`gp.php`).
    Current,
    /// First element set on record (`gp-first.php`).
    First,
    /// Last element set on record (`gp-last.php`).
    Last,
    /// Tabular summary (`table.php`).
    Table,
}

impl Endpoint {
    /// File name of the endpoint script.
    pub fn file_name(&self) -> &'static str {
        match self {
            Endpoint::Current => "gp.php",
            Endpoint::First => "gp-first.php",
            Endpoint::Last => "gp-last.php",
            Endpoint::Table => "table.php",
        }
    }

    /// Absolute path of the endpoint on the origin.
    pub fn path(&self) -> String {
        format!("{ELEMENTS_PATH}{}", self.file_name())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Optional flags for `table.php` queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TableFlags {
    /// Show BSTAR instead of eccentricity.
    pub bstar: bool,
    /// Show the operational status column.
    pub show_ops: bool,
    /// Only objects whose data is older than 3.5 days.
    pub oldest: bool,
    /// Only docked objects.
    pub docked: bool,
    /// Only GEO objects drifting more than 0.1° per day.
    pub movers: bool,
}

impl TableFlags {
    /// Parameter names of the enabled flags, in wire order.
    pub fn enabled(&self) -> impl Iterator<Item = &'static str> {
        [
            ("BSTAR", self.bstar),
            ("SHOW-OPS", self.show_ops),
            ("OLDEST", self.oldest),
            ("DOCKED", self.docked),
            ("MOVERS", self.movers),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
    }
}

/// A GP query usable against any endpoint.
///
/// Exactly one selector (`catnr`, `intdes`, `group`, `name`, `special`) must
/// be non-blank. This is checked by [`Query::build_url`], not on
/// construction, so a `Query` can be assembled field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    /// NORAD catalog number.
    pub catnr: String,
    /// International designator (`yyyy-nnn`).
    pub intdes: String,
    /// Group name, e.g. `STATIONS` or `GPS-OPS`.
    pub group: String,
    /// Satellite name (partial match).
    pub name: String,
    /// Special dataset, see [`special`].
    pub special: String,
    /// Output format; TLE when unset.
    pub format: Option<Format>,
    /// Only sent to `table.php`.
    pub table_flags: TableFlags,
}

impl Query {
    /// Query by NORAD catalog number.
    pub fn by_catnr(catnr: impl Into<String>, format: Format) -> Self {
        Self {
            catnr: catnr.into(),
            format: Some(format),
            ..Self::default()
        }
    }

    /// Query by international designator.
    pub fn by_intdes(intdes: impl Into<String>, format: Format) -> Self {
        Self {
            intdes: intdes.into(),
            format: Some(format),
            ..Self::default()
        }
    }

    /// Query by group name.
    pub fn by_group(group: impl Into<String>, format: Format) -> Self {
        Self {
            group: group.into(),
            format: Some(format),
            ..Self::default()
        }
    }

    /// Query by satellite name.
    pub fn by_name(name: impl Into<String>, format: Format) -> Self {
        Self {
            name: name.into(),
            format: Some(format),
            ..Self::default()
        }
    }

    /// Query a special dataset.
    pub fn by_special(special: impl Into<String>, format: Format) -> Self {
        Self {
            special: special.into(),
            format: Some(format),
            ..Self::default()
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the table flags.
    pub fn with_table_flags(mut self, flags: TableFlags) -> Self {
        self.table_flags = flags;
        self
    }

    /// Build the fully-qualified URL for `endpoint` under `base`.
    ///
    /// Parameters are emitted in a fixed order: the selector, `FORMAT`, then
    /// any table flags, so the same query always yields the same string.
    pub fn build_url(&self, base: &Url, endpoint: Endpoint) -> Result<Url, QueryError> {
        if base.cannot_be_a_base() {
            return Err(QueryError::new(format!("base URL cannot be a base: {base}")));
        }

        let (key, value) = self.selector()?;
        let format = self.format.unwrap_or_default();

        let mut url = base
            .join(&endpoint.path())
            .map_err(|e| QueryError::new(format!("invalid endpoint path: {e}")))?;

        {
            let mut params = url.query_pairs_mut();
            params.clear();
            params.append_pair(key, value);
            params.append_pair(FORMAT_PARAM, format.as_str());

            if endpoint == Endpoint::Table {
                for flag in self.table_flags.enabled() {
                    params.append_pair(flag, "1");
                }
            }
        }

        Ok(url)
    }

    /// The single active selector as a `(key, trimmed value)` pair.
    fn selector(&self) -> Result<(&'static str, &str), QueryError> {
        let candidates = [
            ("CATNR", self.catnr.trim()),
            ("INTDES", self.intdes.trim()),
            ("GROUP", self.group.trim()),
            ("NAME", self.name.trim()),
            ("SPECIAL", self.special.trim()),
        ];

        let mut active = candidates.into_iter().filter(|(_, v)| !v.is_empty());

        match (active.next(), active.next()) {
            (Some(selector), None) => Ok(selector),
            (Some(_), Some(_)) => Err(QueryError::new(
                "ambiguous selector (set exactly one of CATNR/INTDES/GROUP/NAME/SPECIAL)",
            )),
            (None, _) => Err(QueryError::new(
                "missing selector (set one of CATNR/INTDES/GROUP/NAME/SPECIAL)",
            )),
        }
    }
}
