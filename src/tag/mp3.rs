//! ID3v2 tag block for MP3 downloads

use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Version};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{COVER_DESCRIPTION, COVER_MIME, TagError, TagMetadata};

/// Encode a self-contained ID3v2.4 tag
///
/// Artist, album and title are always present, even when empty. The track
/// number is stored as its decimal string.
pub fn encode_tag(meta: &TagMetadata) -> Result<Vec<u8>, TagError> {
    let mut tag = Tag::new();
    tag.set_artist(meta.artist.as_str());
    tag.set_album(meta.album.as_str());
    tag.set_title(meta.title.as_str());
    tag.set_text("TRCK", meta.track_number.to_string());

    if let Some(cover) = &meta.cover {
        tag.add_frame(Picture {
            mime_type: COVER_MIME.to_string(),
            picture_type: PictureType::CoverFront,
            description: COVER_DESCRIPTION.to_string(),
            data: cover.data.clone(),
        });
    }

    let mut out = Vec::new();
    tag.write_to(&mut out, Version::Id3v24)?;
    Ok(out)
}

/// Write the tag block ahead of the audio payload
pub async fn write_tag<W>(writer: &mut W, meta: &TagMetadata) -> Result<(), TagError>
where
    W: AsyncWrite + Unpin,
{
    let tag = encode_tag(meta)?;
    writer.write_all(&tag).await?;
    debug!("Wrote ID3 tag ({} bytes)", tag.len());
    Ok(())
}
