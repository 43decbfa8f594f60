//! Element IDs, written with their marker bits as they appear in files.

// EBML header
pub const EBML_HEADER: u32 = 0x1A45DFA3;
pub const EBML_VERSION: u32 = 0x4286;
pub const EBML_READ_VERSION: u32 = 0x42F7;
pub const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
pub const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
pub const DOC_TYPE: u32 = 0x4282;
pub const DOC_TYPE_VERSION: u32 = 0x4287;
pub const DOC_TYPE_READ_VERSION: u32 = 0x4285;

// Global elements, valid anywhere
pub const VOID: u32 = 0xEC;
pub const CRC32: u32 = 0xBF;

// Top level
pub const SEGMENT: u32 = 0x18538067;
pub const SEEK_HEAD: u32 = 0x114D9B74;
pub const INFO: u32 = 0x1549A966;
pub const TRACKS: u32 = 0x1654AE6B;
pub const CUES: u32 = 0x1C53BB6B;
pub const TAGS: u32 = 0x1254C367;
pub const CHAPTERS: u32 = 0x1043A770;
pub const ATTACHMENTS: u32 = 0x1941A469;
pub const CLUSTER: u32 = 0x1F43B675;

// SeekHead
pub const SEEK: u32 = 0x4DBB;
pub const SEEK_ID: u32 = 0x53AB;
pub const SEEK_POSITION: u32 = 0x53AC;

// Info
pub const TIMECODE_SCALE: u32 = 0x2AD7B1;
pub const DURATION: u32 = 0x4489;
pub const TITLE: u32 = 0x7BA9;
pub const WRITING_APP: u32 = 0x5741;
pub const MUXING_APP: u32 = 0x4D80;
pub const DATE_UTC: u32 = 0x4461;
pub const SEGMENT_UID: u32 = 0x73A4;

// Tracks
pub const TRACK_ENTRY: u32 = 0xAE;
pub const TRACK_NUMBER: u32 = 0xD7;
pub const TRACK_UID: u32 = 0x73C5;
pub const TRACK_TYPE: u32 = 0x83;
pub const TRACK_FLAG_ENABLED: u32 = 0xB9;
pub const TRACK_FLAG_DEFAULT: u32 = 0x88;
pub const TRACK_FLAG_FORCED: u32 = 0x55AA;
pub const TRACK_FLAG_LACING: u32 = 0x9C;
pub const TRACK_DEFAULT_DURATION: u32 = 0x23E383;
pub const TRACK_TIMECODE_SCALE: u32 = 0x23314F;
pub const TRACK_NAME: u32 = 0x536E;
pub const TRACK_LANGUAGE: u32 = 0x22B59C;
pub const CODEC_ID: u32 = 0x86;
pub const CODEC_PRIVATE: u32 = 0x63A2;
pub const CODEC_NAME: u32 = 0x258688;
pub const CODEC_DELAY: u32 = 0x56AA;
pub const SEEK_PRE_ROLL: u32 = 0x56BB;
pub const TRACK_VIDEO: u32 = 0xE0;
pub const TRACK_AUDIO: u32 = 0xE1;
pub const CONTENT_ENCODINGS: u32 = 0x6D80;

// ContentEncodings
pub const CONTENT_ENCODING: u32 = 0x6240;
pub const CONTENT_ENCODING_ORDER: u32 = 0x5031;
pub const CONTENT_ENCODING_SCOPE: u32 = 0x5032;
pub const CONTENT_ENCODING_TYPE: u32 = 0x5033;
pub const CONTENT_COMPRESSION: u32 = 0x5034;
pub const CONTENT_COMP_ALGO: u32 = 0x4254;
pub const CONTENT_COMP_SETTINGS: u32 = 0x4255;
pub const CONTENT_ENCRYPTION: u32 = 0x5035;
pub const CONTENT_ENC_ALGO: u32 = 0x47E1;
pub const CONTENT_ENC_KEY_ID: u32 = 0x47E2;

// TrackVideo
pub const VIDEO_FLAG_INTERLACED: u32 = 0x9A;
pub const VIDEO_STEREO_MODE: u32 = 0x53B8;
pub const VIDEO_PIXEL_WIDTH: u32 = 0xB0;
pub const VIDEO_PIXEL_HEIGHT: u32 = 0xBA;
pub const VIDEO_DISPLAY_WIDTH: u32 = 0x54B0;
pub const VIDEO_DISPLAY_HEIGHT: u32 = 0x54BA;
pub const VIDEO_ASPECT_RATIO_TYPE: u32 = 0x54B3;
pub const VIDEO_COLOUR_SPACE: u32 = 0x2EB524;
pub const VIDEO_FRAME_RATE: u32 = 0x2383E3;

// TrackAudio
pub const AUDIO_SAMPLING_FREQ: u32 = 0xB5;
pub const AUDIO_OUTPUT_SAMPLING_FREQ: u32 = 0x78B5;
pub const AUDIO_CHANNELS: u32 = 0x9F;
pub const AUDIO_BIT_DEPTH: u32 = 0x6264;

// Cues
pub const CUE_POINT: u32 = 0xBB;
pub const CUE_TIME: u32 = 0xB3;
pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
pub const CUE_TRACK: u32 = 0xF7;
pub const CUE_CLUSTER_POSITION: u32 = 0xF1;

// Tags
pub const TAG: u32 = 0x7373;
pub const TAG_TARGETS: u32 = 0x63C0;
pub const TAG_TARGET_TYPE_VALUE: u32 = 0x68CA;
pub const TAG_TARGET_TYPE: u32 = 0x63CA;
pub const TAG_TRACK_UID: u32 = 0x63C5;
pub const TAG_CHAPTER_UID: u32 = 0x63C4;
pub const TAG_ATTACHMENT_UID: u32 = 0x63C6;
pub const SIMPLE_TAG: u32 = 0x67C8;
pub const TAG_NAME: u32 = 0x45A3;
pub const TAG_LANGUAGE: u32 = 0x447A;
pub const TAG_DEFAULT: u32 = 0x4484;
pub const TAG_STRING: u32 = 0x4487;
pub const TAG_BINARY: u32 = 0x4485;

// Chapters
pub const EDITION_ENTRY: u32 = 0x45B9;
pub const EDITION_UID: u32 = 0x45BC;
pub const EDITION_FLAG_HIDDEN: u32 = 0x45BD;
pub const EDITION_FLAG_DEFAULT: u32 = 0x45DB;
pub const EDITION_FLAG_ORDERED: u32 = 0x45DD;
pub const CHAPTER_ATOM: u32 = 0xB6;
pub const CHAPTER_UID: u32 = 0x73C4;
pub const CHAPTER_TIME_START: u32 = 0x91;
pub const CHAPTER_TIME_END: u32 = 0x92;
pub const CHAPTER_FLAG_HIDDEN: u32 = 0x98;
pub const CHAPTER_FLAG_ENABLED: u32 = 0x4598;
pub const CHAPTER_DISPLAY: u32 = 0x80;
pub const CHAP_STRING: u32 = 0x85;
pub const CHAP_LANGUAGE: u32 = 0x437C;

// Attachments
pub const ATTACHED_FILE: u32 = 0x61A7;
pub const FILE_DESCRIPTION: u32 = 0x467E;
pub const FILE_NAME: u32 = 0x466E;
pub const FILE_MIME_TYPE: u32 = 0x4660;
pub const FILE_DATA: u32 = 0x465C;
pub const FILE_UID: u32 = 0x46AE;

// Cluster
pub const CLUSTER_TIMECODE: u32 = 0xE7;
pub const CLUSTER_POSITION: u32 = 0xA7;
pub const CLUSTER_PREV_SIZE: u32 = 0xAB;
pub const SIMPLE_BLOCK: u32 = 0xA3;
pub const BLOCK_GROUP: u32 = 0xA0;
pub const BLOCK: u32 = 0xA1;
pub const BLOCK_DURATION: u32 = 0x9B;
pub const BLOCK_REFERENCE: u32 = 0xFB;
