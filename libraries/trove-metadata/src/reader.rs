/// Tag extractor implementation using lofty
use crate::error::{MetadataError, Result};
use lofty::{Accessor, AudioFile, ItemKey, ParseOptions, Probe, Tag, TaggedFile, TaggedFileExt};
use std::path::Path;
use trove_core::{ExtractError, TagExtractor, TagFields};

/// Tag extractor using the lofty library
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagExtractor;

impl LoftyTagExtractor {
    /// Create a new extractor
    pub fn new() -> Self {
        Self
    }

    /// Read tags and audio properties
    fn read_full(path: &Path) -> Result<TagFields> {
        let tagged_file = Probe::open(path)?.read()?;

        let mut fields = Self::tag_fields(&tagged_file);
        let properties = tagged_file.properties();
        fields.duration = properties.duration().as_secs() as u32;
        fields.bitrate = properties.audio_bitrate().unwrap_or(0);

        Ok(fields)
    }

    /// Read tags only, for files whose audio stream lofty cannot parse
    fn read_tags_only(path: &Path) -> Result<TagFields> {
        let tagged_file = Probe::open(path)?
            .options(ParseOptions::new().read_properties(false))
            .read()?;

        Ok(Self::tag_fields(&tagged_file))
    }

    fn tag_fields(tagged_file: &TaggedFile) -> TagFields {
        // Prefer the format's native tag (ID3v2 for MP3, Vorbis for OGG/FLAC)
        tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .map(Self::extract_from_tag)
            .unwrap_or_default()
    }

    /// Extract fields from a lofty tag
    fn extract_from_tag(tag: &Tag) -> TagFields {
        let text = |key: &ItemKey| tag.get_string(key).unwrap_or_default().to_string();

        TagFields {
            title: tag.title().map(|s| s.to_string()).unwrap_or_default(),
            artist: tag.artist().map(|s| s.to_string()).unwrap_or_default(),
            album: tag.album().map(|s| s.to_string()).unwrap_or_default(),
            genre: tag.genre().map(|s| s.to_string()).unwrap_or_default(),
            year: tag.year().unwrap_or(0),
            track: tag.track().unwrap_or(0),
            disc: tag.disk().unwrap_or(0),
            duration: 0,
            bitrate: 0,
            mb_track_id: text(&ItemKey::MusicBrainzRecordingId),
            mb_album_id: text(&ItemKey::MusicBrainzReleaseId),
            mb_artist_id: text(&ItemKey::MusicBrainzArtistId),
        }
    }
}

impl TagExtractor for LoftyTagExtractor {
    fn extract(&self, path: &Path) -> std::result::Result<TagFields, ExtractError> {
        if !path.exists() {
            let err = MetadataError::FileNotFound(path.display().to_string());
            return Err(ExtractError::new(path, err.to_string()));
        }

        match Self::read_full(path) {
            Ok(fields) => Ok(fields),
            Err(full_err) => {
                // Salvage whatever tags are readable without the audio stream
                let partial = Self::read_tags_only(path).unwrap_or_default();
                tracing::debug!(
                    "Partial tag read for {}: {} (title: {:?})",
                    path.display(),
                    full_err,
                    partial.title
                );
                Err(ExtractError::new(path, full_err.to_string()).with_partial(partial))
            }
        }
    }
}
