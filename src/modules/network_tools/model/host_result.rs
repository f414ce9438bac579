use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static LOSS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<loss>\d+(?:\.\d+)?)% packet loss").expect("valid loss regex"));

static TIME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(?P<ms>\d+(?:\.\d+)?) ms").expect("valid time regex"));

static RTT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<min>\d+(?:\.\d+)?)/(?P<avg>\d+(?:\.\d+)?)/(?P<max>\d+(?:\.\d+)?)/(?P<stddev>\d+(?:\.\d+)?) ms",
    )
    .expect("valid rtt regex")
});

/// Summary line of a ping run: `min/avg/max/stddev` in milliseconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RoundTripStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub stddev: f64,
}

/// What was extracted from the output of a successful ping.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProbeDetails {
    /// Per-packet round-trip times in order of arrival
    pub ms: Vec<f64>,
    /// Packet loss in percent
    pub loss: Option<f64>,
    pub rtt: Option<RoundTripStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Result of probing one host. A host that is down carries no details and
/// serializes as `{"up": false}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HostResult {
    pub up: bool,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ProbeDetails>,
}

impl HostResult {
    pub fn down() -> Self {
        Self {
            up: false,
            details: None,
        }
    }

    pub fn up(details: ProbeDetails) -> Self {
        Self {
            up: true,
            details: Some(details),
        }
    }

    /// Builds the result for a finished ping from its exit code and output.
    pub fn from_output(returncode: i32, output: &str) -> Self {
        if returncode == 0 {
            Self::up(parse_ping_output(output))
        } else {
            Self::down()
        }
    }

    pub fn warnings(&self) -> &[String] {
        self.details
            .as_ref()
            .map(|d| d.warnings.as_slice())
            .unwrap_or_default()
    }
}

/// Parses the report of the `ping` utility.
///
/// Missing pieces are not errors: loss stays `None`, the per-packet list
/// stays empty, and a missing summary line leaves `rtt` unset with a
/// warning recorded.
pub fn parse_ping_output(output: &str) -> ProbeDetails {
    let loss = LOSS_REGEX
        .captures(output)
        .and_then(|caps| caps["loss"].parse().ok());

    let ms = TIME_REGEX
        .captures_iter(output)
        .filter_map(|caps| caps["ms"].parse().ok())
        .collect();

    let mut warnings = Vec::new();
    let rtt = match RTT_REGEX.captures(output) {
        Some(caps) => Some(RoundTripStats {
            min: caps["min"].parse().unwrap_or_default(),
            avg: caps["avg"].parse().unwrap_or_default(),
            max: caps["max"].parse().unwrap_or_default(),
            stddev: caps["stddev"].parse().unwrap_or_default(),
        }),
        None => {
            warnings.push("round-trip summary line not found".to_string());
            None
        }
    };

    ProbeDetails {
        ms,
        loss,
        rtt,
        warnings,
    }
}
