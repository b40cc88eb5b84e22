//! Delimited address and prefix lists
//!
//! Command-line style inputs such as `10.5.0.2/32, fd00::2/128` are split on a
//! delimiter, trimmed and parsed. A single bad segment fails the whole list.

use ipnet::IpNet;
use std::net::IpAddr;
use std::str::FromStr;

/// Input parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value {segment:?} at position {index}: {reason}")]
pub struct ParseError {
    /// The trimmed segment that failed
    pub segment: String,
    /// Zero-based position of the segment in the list
    pub index: usize,
    /// Why the segment was rejected
    pub reason: String,
}

/// Split `input` on `delim` and parse every trimmed segment as `T`.
///
/// An empty input is one empty segment, which no address type accepts.
pub fn parse_separated<T>(input: &str, delim: &str) -> Result<Vec<T>, ParseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    input
        .split(delim)
        .map(str::trim)
        .enumerate()
        .map(|(index, segment)| {
            segment.parse::<T>().map_err(|e| ParseError {
                segment: segment.to_string(),
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Parse a list of CIDR prefixes, keeping host bits as written
pub fn parse_prefixes(input: &str, delim: &str) -> Result<Vec<IpNet>, ParseError> {
    parse_separated(input, delim)
}

/// Parse a list of bare IP addresses
pub fn parse_addresses(input: &str, delim: &str) -> Result<Vec<IpAddr>, ParseError> {
    parse_separated(input, delim)
}

/// Parse a keepalive interval in seconds (0 disables it)
pub fn parse_keepalive(input: &str) -> Result<u16, ParseError> {
    let trimmed = input.trim();
    trimmed.parse::<u16>().map_err(|e| ParseError {
        segment: trimmed.to_string(),
        index: 0,
        reason: e.to_string(),
    })
}
