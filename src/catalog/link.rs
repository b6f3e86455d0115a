//! Shared link parsing

use std::fmt;
use url::Url;

/// What a shared link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Song,
    Album,
    Artist,
}

impl LinkKind {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment.to_ascii_lowercase().as_str() {
            "song" | "track" => Some(LinkKind::Song),
            "album" => Some(LinkKind::Album),
            "artist" => Some(LinkKind::Artist),
            _ => None,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Song => f.write_str("song"),
            LinkKind::Album => f.write_str("album"),
            LinkKind::Artist => f.write_str("artist"),
        }
    }
}

/// A parsed link: content kind and catalog identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub kind: LinkKind,
    pub id: String,
}

/// Parse `album:<id>` shorthand or a URL containing `/<kind>/<id>`
///
/// URL fragments are searched too, which covers single-page web players
/// such as `http://host/app/#/album/<id>/show`.
pub fn parse_link(input: &str) -> Option<Link> {
    let input = input.trim();

    if let Ok(url) = Url::parse(input) {
        if url.cannot_be_a_base() {
            return parse_shorthand(input);
        }
        let path = url.path().to_string();
        let fragment = url.fragment().unwrap_or("").to_string();
        return find_in_segments(path.split('/').chain(fragment.split('/')));
    }

    parse_shorthand(input)
}

fn parse_shorthand(input: &str) -> Option<Link> {
    let (kind, id) = input.split_once(':')?;
    let kind = LinkKind::from_segment(kind)?;
    let id = id.trim();
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(Link {
        kind,
        id: id.to_string(),
    })
}

fn find_in_segments<'a>(segments: impl Iterator<Item = &'a str>) -> Option<Link> {
    let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();
    segments.windows(2).find_map(|pair| {
        let kind = LinkKind::from_segment(pair[0])?;
        Some(Link {
            kind,
            id: pair[1].to_string(),
        })
    })
}
