mod archive_repo;
mod hls_playlist_repo;
mod processing_log_repo;
mod segment_proof_repo;
mod stream_metadata_repo;

pub use archive_repo::ArchiveRepo;
pub use hls_playlist_repo::HlsPlaylistRepo;
pub use processing_log_repo::ProcessingLogRepo;
pub use segment_proof_repo::SegmentProofRepo;
pub use stream_metadata_repo::StreamMetadataRepo;
