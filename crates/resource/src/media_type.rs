//! Media types a resource can carry and the content negotiation rules applied to them.
//!
//! Negotiation is deliberately simple: a `Content-Type` must name one of the six known media
//! types exactly, and an `Accept` value is acceptable when the resource's media type string
//! occurs anywhere inside it. Quality values, wildcards and parameters are not interpreted.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// The fixed media type table, indexed by [`MediaType::id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[repr(u8)]
pub enum MediaType {
    /// `text/html`
    #[default]
    #[serde(rename = "text/html")]
    Text = 0,
    /// `text/xml`
    #[serde(rename = "text/xml")]
    Xml = 1,
    /// `text/plain`
    #[serde(rename = "text/plain")]
    Plain = 2,
    /// `application/json`
    #[serde(rename = "application/json")]
    Json = 3,
    /// `application/octet-stream`
    #[serde(rename = "application/octet-stream")]
    Octet = 4,
    /// `application/xml`
    #[serde(rename = "application/xml")]
    AppXml = 5,
}

impl MediaType {
    pub const ALL: [MediaType; 6] = [MediaType::Text, MediaType::Xml, MediaType::Plain, MediaType::Json, MediaType::Octet, MediaType::AppXml];

    pub const fn as_str(self) -> &'static str {
        match self {
            MediaType::Text => "text/html",
            MediaType::Xml => "text/xml",
            MediaType::Plain => "text/plain",
            MediaType::Json => "application/json",
            MediaType::Octet => "application/octet-stream",
            MediaType::AppXml => "application/xml",
        }
    }

    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value is not one of the known media types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown media type: {0:?}")]
pub struct UnknownMediaType(pub String);

impl FromStr for MediaType {
    type Err = UnknownMediaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        media_type_id(s).ok_or_else(|| UnknownMediaType(s.to_owned()))
    }
}

impl TryFrom<u8> for MediaType {
    type Error = UnknownMediaType;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or_else(|| UnknownMediaType(id.to_string()))
    }
}

/// Looks up a `Content-Type` value in the media type table.
///
/// Only an exact, case-sensitive match counts, so `text/plain; charset=utf-8` is unknown.
pub fn media_type_id(content_type: &str) -> Option<MediaType> {
    MediaType::ALL.into_iter().find(|media_type| media_type.as_str() == content_type)
}

/// Whether `media_type` occurs as a contiguous substring of the `Accept` value.
pub fn is_acceptable(accept: &str, media_type: MediaType) -> bool {
    let needle = media_type.as_str().as_bytes();
    accept.len() >= needle.len() && accept.as_bytes().windows(needle.len()).any(|window| window == needle)
}
