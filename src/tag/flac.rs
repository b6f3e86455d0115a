//! FLAC metadata block rewriting
//!
//! Only the leading STREAMINFO block of the source stream is kept. Every
//! other block the service sent is skipped, and a fresh VORBIS_COMMENT block
//! plus an optional PICTURE block are emitted after it. The reader is left
//! positioned at the first audio frame so the caller can copy the payload
//! through untouched.

use lofty::picture::{MimeType, Picture, PictureInformation, PictureType};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{COVER_DESCRIPTION, TagError, TagMetadata};
use crate::utils::cover_art::CoverArt;

/// Stream signature at offset 0
pub const MAGIC: &[u8; 4] = b"fLaC";

const STREAMINFO_LEN: usize = 34;
const MAX_BLOCK_LEN: usize = 0x00FF_FFFF;
const LAST_BLOCK_FLAG: u8 = 0x80;

/// Bits per pixel advertised for embedded JPEG art
const PICTURE_COLOR_DEPTH: u32 = 24;

const VENDOR: &str = concat!("tunegrab ", env!("CARGO_PKG_VERSION"));

/// Metadata block type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    CueSheet,
    Picture,
    Reserved(u8),
}

impl BlockType {
    pub fn code(self) -> u8 {
        match self {
            BlockType::StreamInfo => 0,
            BlockType::Padding => 1,
            BlockType::Application => 2,
            BlockType::SeekTable => 3,
            BlockType::VorbisComment => 4,
            BlockType::CueSheet => 5,
            BlockType::Picture => 6,
            BlockType::Reserved(code) => code,
        }
    }
}

impl From<u8> for BlockType {
    fn from(code: u8) -> Self {
        match code & !LAST_BLOCK_FLAG {
            0 => BlockType::StreamInfo,
            1 => BlockType::Padding,
            2 => BlockType::Application,
            3 => BlockType::SeekTable,
            4 => BlockType::VorbisComment,
            5 => BlockType::CueSheet,
            6 => BlockType::Picture,
            other => BlockType::Reserved(other),
        }
    }
}

/// One typed, length-prefixed metadata block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBlock {
    pub kind: BlockType,
    pub data: Vec<u8>,
}

impl MetadataBlock {
    pub fn new(kind: BlockType, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Append the 4-byte block header and body to `out`
    pub fn encode_into(&self, last: bool, out: &mut Vec<u8>) -> Result<(), TagError> {
        let len = self.data.len();
        if len > MAX_BLOCK_LEN {
            return Err(TagError::BlockTooLarge(len));
        }

        let flag = if last { LAST_BLOCK_FLAG } else { 0 };
        let len_bytes = (len as u32).to_be_bytes();
        out.push(flag | self.kind.code());
        out.extend_from_slice(&len_bytes[1..]);
        out.extend_from_slice(&self.data);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct BlockHeader {
    kind: BlockType,
    last: bool,
    len: usize,
}

async fn read_block_header<R>(reader: &mut R) -> Result<BlockHeader, TagError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; 4];
    reader.read_exact(&mut raw).await?;

    Ok(BlockHeader {
        kind: BlockType::from(raw[0]),
        last: raw[0] & LAST_BLOCK_FLAG != 0,
        len: u32::from_be_bytes([0, raw[1], raw[2], raw[3]]) as usize,
    })
}

async fn skip_exact<R>(reader: &mut R, len: usize) -> Result<(), TagError>
where
    R: AsyncRead + Unpin,
{
    let skipped = tokio::io::copy(&mut (&mut *reader).take(len as u64), &mut tokio::io::sink()).await?;
    if skipped != len as u64 {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(())
}

/// Consume the signature and every metadata block, returning STREAMINFO
///
/// On success the reader sits at the first audio frame.
pub async fn read_stream_info<R>(reader: &mut R) -> Result<MetadataBlock, TagError>
where
    R: AsyncRead + Unpin,
{
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).await?;
    if &magic != MAGIC {
        return Err(TagError::BadMagic);
    }

    let header = read_block_header(reader).await?;
    if header.kind != BlockType::StreamInfo {
        return Err(TagError::MissingStreamInfo(header.kind.code()));
    }
    if header.len != STREAMINFO_LEN {
        return Err(TagError::BadStreamInfoLength(header.len));
    }

    let mut data = vec![0u8; header.len];
    reader.read_exact(&mut data).await?;

    let mut last = header.last;
    let mut skipped = 0usize;
    while !last {
        let next = read_block_header(reader).await?;
        skip_exact(reader, next.len).await?;
        last = next.last;
        skipped += 1;
    }

    debug!("Dropped {} source metadata blocks", skipped);
    Ok(MetadataBlock::new(BlockType::StreamInfo, data))
}

/// Build a VORBIS_COMMENT block for the given metadata
pub fn comment_block(meta: &TagMetadata) -> MetadataBlock {
    let track_number = meta.track_number.to_string();
    let fields = [
        ("TITLE", meta.title.as_str()),
        ("ARTIST", meta.artist.as_str()),
        ("ALBUM", meta.album.as_str()),
        ("TRACKNUMBER", track_number.as_str()),
    ];

    let mut data = Vec::new();
    push_le_string(&mut data, VENDOR);
    data.extend_from_slice(&(fields.len() as u32).to_le_bytes());
    for (key, value) in fields {
        push_le_string(&mut data, &format!("{}={}", key, value));
    }

    MetadataBlock::new(BlockType::VorbisComment, data)
}

/// Build a PICTURE block carrying a front cover
pub fn picture_block(cover: &CoverArt) -> MetadataBlock {
    let picture = Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::Jpeg),
        Some(COVER_DESCRIPTION.to_string()),
        cover.data.clone(),
    );
    let info = PictureInformation {
        width: cover.width,
        height: cover.height,
        color_depth: PICTURE_COLOR_DEPTH,
        num_colors: 0,
    };

    MetadataBlock::new(BlockType::Picture, picture.as_flac_bytes(info, false))
}

fn push_le_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

/// Serialize signature, STREAMINFO, comments and optional picture
///
/// Only the final block carries the last-block flag.
pub fn build_header(stream_info: &MetadataBlock, meta: &TagMetadata) -> Result<Vec<u8>, TagError> {
    let mut blocks = vec![stream_info.clone(), comment_block(meta)];
    if let Some(cover) = &meta.cover {
        blocks.push(picture_block(cover));
    }

    let mut out = Vec::with_capacity(MAGIC.len() + blocks.iter().map(|b| b.data.len() + 4).sum::<usize>());
    out.extend_from_slice(MAGIC);
    let final_index = blocks.len() - 1;
    for (i, block) in blocks.iter().enumerate() {
        block.encode_into(i == final_index, &mut out)?;
    }
    Ok(out)
}

/// Replace the metadata of a FLAC stream while it is being copied
///
/// Reads the source metadata from `reader`, writes the rebuilt header to
/// `writer` and returns with `reader` at the first audio frame. Nothing is
/// written if the source header cannot be parsed.
pub async fn write_header<R, W>(
    reader: &mut R,
    writer: &mut W,
    meta: &TagMetadata,
) -> Result<(), TagError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let stream_info = read_stream_info(reader).await?;
    let header = build_header(&stream_info, meta)?;
    writer.write_all(&header).await?;

    debug!(
        "Wrote FLAC header ({} bytes, picture: {})",
        header.len(),
        meta.cover.is_some()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::COVER_MIME;

    const AUDIO: &[u8] = b"\xff\xf8\x69\x18audio-frames-follow-here";

    fn stream_info_body() -> Vec<u8> {
        (0..STREAMINFO_LEN as u8).collect()
    }

    fn source_stream(extra: &[(u8, &[u8])]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        let mut blocks = vec![(0u8, stream_info_body())];
        blocks.extend(extra.iter().map(|(k, d)| (*k, d.to_vec())));
        let final_index = blocks.len() - 1;
        for (i, (kind, data)) in blocks.iter().enumerate() {
            MetadataBlock::new(BlockType::from(*kind), data.clone())
                .encode_into(i == final_index, &mut out)
                .unwrap();
        }
        out.extend_from_slice(AUDIO);
        out
    }

    fn metadata(cover: Option<CoverArt>) -> TagMetadata {
        TagMetadata {
            title: "Windowlicker".to_string(),
            artist: "Aphex Twin".to_string(),
            album: "Windowlicker EP".to_string(),
            track_number: 1,
            cover,
        }
    }

    fn cover() -> CoverArt {
        CoverArt {
            data: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4],
            width: 800,
            height: 800,
        }
    }

    /// Walk the blocks of an encoded stream: (type, last, body), audio offset
    fn walk(bytes: &[u8]) -> (Vec<(u8, bool, Vec<u8>)>, usize) {
        assert_eq!(&bytes[..4], MAGIC);
        let mut pos = 4;
        let mut blocks = Vec::new();
        loop {
            let head = bytes[pos];
            let len = u32::from_be_bytes([0, bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]]) as usize;
            let body = bytes[pos + 4..pos + 4 + len].to_vec();
            let last = head & LAST_BLOCK_FLAG != 0;
            blocks.push((head & 0x7F, last, body));
            pos += 4 + len;
            if last {
                return (blocks, pos);
            }
        }
    }

    fn comments(body: &[u8]) -> Vec<String> {
        let read_u32 = |at: usize| u32::from_le_bytes(body[at..at + 4].try_into().unwrap()) as usize;
        let vendor_len = read_u32(0);
        let mut pos = 4 + vendor_len;
        let count = read_u32(pos);
        pos += 4;
        let mut out = Vec::new();
        for _ in 0..count {
            let len = read_u32(pos);
            out.push(String::from_utf8(body[pos + 4..pos + 4 + len].to_vec()).unwrap());
            pos += 4 + len;
        }
        out
    }

    async fn rewrite(input: &[u8], meta: &TagMetadata) -> Result<Vec<u8>, TagError> {
        let mut reader = input;
        let mut out = Vec::new();
        write_header(&mut reader, &mut out, meta).await?;
        tokio::io::copy(&mut reader, &mut out).await?;
        Ok(out)
    }

    #[tokio::test]
    async fn test_rewrite_with_cover_keeps_three_blocks() {
        let input = source_stream(&[(3, &[0u8; 18]), (4, b"old-comment-block")]);
        let output = rewrite(&input, &metadata(Some(cover()))).await.unwrap();

        let (blocks, audio_at) = walk(&output);
        let kinds: Vec<u8> = blocks.iter().map(|b| b.0).collect();
        assert_eq!(kinds, vec![0, 4, 6]);
        assert_eq!(
            blocks.iter().map(|b| b.1).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert_eq!(blocks[0].2, stream_info_body());
        assert_eq!(&output[audio_at..], AUDIO);
    }

    #[tokio::test]
    async fn test_rewrite_without_cover_marks_comment_final() {
        let input = source_stream(&[(4, b"old")]);
        let output = rewrite(&input, &metadata(None)).await.unwrap();

        let (blocks, audio_at) = walk(&output);
        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].0, blocks[0].1), (0, false));
        assert_eq!((blocks[1].0, blocks[1].1), (4, true));
        assert_eq!(&output[audio_at..], AUDIO);
    }

    #[tokio::test]
    async fn test_stream_info_only_source() {
        let input = source_stream(&[]);
        let output = rewrite(&input, &metadata(Some(cover()))).await.unwrap();

        let (blocks, audio_at) = walk(&output);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks.iter().filter(|b| b.1).count(), 1);
        assert_eq!(&output[audio_at..], AUDIO);
    }

    #[tokio::test]
    async fn test_comment_fields() {
        let input = source_stream(&[]);
        let output = rewrite(&input, &metadata(None)).await.unwrap();
        let (blocks, _) = walk(&output);

        assert_eq!(
            comments(&blocks[1].2),
            vec![
                "TITLE=Windowlicker",
                "ARTIST=Aphex Twin",
                "ALBUM=Windowlicker EP",
                "TRACKNUMBER=1",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_fields_still_written() {
        let meta = TagMetadata {
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            track_number: 0,
            cover: None,
        };
        let output = rewrite(&source_stream(&[]), &meta).await.unwrap();
        let (blocks, _) = walk(&output);

        assert_eq!(
            comments(&blocks[1].2),
            vec!["TITLE=", "ARTIST=", "ALBUM=", "TRACKNUMBER=0"]
        );
    }

    #[test]
    fn test_picture_block_layout() {
        let art = cover();
        let block = picture_block(&art);
        let body = &block.data;
        let be = |at: usize| u32::from_be_bytes(body[at..at + 4].try_into().unwrap());

        // picture type 3 is the front cover
        assert_eq!(be(0), 3);
        assert_eq!(be(4) as usize, COVER_MIME.len());
        assert_eq!(&body[8..8 + COVER_MIME.len()], COVER_MIME.as_bytes());
        let desc_at = 8 + COVER_MIME.len();
        assert_eq!(be(desc_at) as usize, COVER_DESCRIPTION.len());
        let dims_at = desc_at + 4 + COVER_DESCRIPTION.len();
        assert_eq!(be(dims_at), 800);
        assert_eq!(be(dims_at + 4), 800);
        assert_eq!(be(dims_at + 8), PICTURE_COLOR_DEPTH);
        assert_eq!(be(dims_at + 12), 0);
        assert_eq!(be(dims_at + 16) as usize, art.data.len());
        assert_eq!(&body[dims_at + 20..], art.data.as_slice());
    }

    #[tokio::test]
    async fn test_bad_magic_writes_nothing() {
        let mut input = source_stream(&[]);
        input[0] = b'X';
        let mut reader = input.as_slice();
        let mut out = Vec::new();

        let err = write_header(&mut reader, &mut out, &metadata(None)).await.unwrap_err();
        assert!(matches!(err, TagError::BadMagic));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_first_block_must_be_stream_info() {
        let mut input = MAGIC.to_vec();
        MetadataBlock::new(BlockType::VorbisComment, b"x".to_vec())
            .encode_into(true, &mut input)
            .unwrap();
        let mut reader = input.as_slice();
        let mut out = Vec::new();

        let err = write_header(&mut reader, &mut out, &metadata(None)).await.unwrap_err();
        assert!(matches!(err, TagError::MissingStreamInfo(4)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_trailing_block_fails() {
        let mut input = MAGIC.to_vec();
        MetadataBlock::new(BlockType::StreamInfo, stream_info_body())
            .encode_into(false, &mut input)
            .unwrap();
        // header claims 100 bytes, only 3 follow
        input.extend_from_slice(&[0x84, 0, 0, 100, 1, 2, 3]);
        let mut reader = input.as_slice();
        let mut out = Vec::new();

        assert!(write_header(&mut reader, &mut out, &metadata(None)).await.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_oversized_block_rejected() {
        let block = MetadataBlock::new(BlockType::Picture, vec![0u8; MAX_BLOCK_LEN + 1]);
        let mut out = Vec::new();
        assert!(matches!(
            block.encode_into(true, &mut out),
            Err(TagError::BlockTooLarge(_))
        ));
    }

    #[test]
    fn test_block_type_codes() {
        assert_eq!(BlockType::from(0x86), BlockType::Picture);
        assert_eq!(BlockType::from(3), BlockType::SeekTable);
        assert_eq!(BlockType::Reserved(9).code(), 9);
    }
}
