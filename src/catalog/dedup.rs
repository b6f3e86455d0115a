//! Collapse same-titled albums in an artist catalog
//!
//! Artist listings often carry an explicit and an edited release under the
//! same title. Only one of each title is kept.

use std::collections::HashMap;

use super::AlbumRef;

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Keep one album per normalized title
///
/// The first album seen for a title is kept unless a later one matches the
/// edited/explicit preference and the kept one does not. Order of first
/// appearance is preserved.
pub fn dedup_albums(albums: Vec<AlbumRef>, prefer_edited: bool) -> Vec<AlbumRef> {
    let mut kept: Vec<AlbumRef> = Vec::with_capacity(albums.len());
    let mut by_title: HashMap<String, usize> = HashMap::new();

    for album in albums {
        let key = normalize_title(&album.title);
        match by_title.get(&key) {
            None => {
                by_title.insert(key, kept.len());
                kept.push(album);
            }
            Some(&index) => {
                let current = &kept[index];
                if current.is_edited() != prefer_edited && album.is_edited() == prefer_edited {
                    kept[index] = album;
                }
            }
        }
    }

    kept
}
