use std::path::Path;

/// Leading bytes of a gzip member
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Leading bytes of a zstd frame
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Compression format of a FASTQ stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zstd,
}
impl Compression {
    /// Detects the format from the first bytes of a stream
    #[must_use]
    pub fn sniff(head: &[u8]) -> Self {
        if head.starts_with(&GZIP_MAGIC) {
            Self::Gzip
        } else if head.starts_with(&ZSTD_MAGIC) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Infers the format from a path suffix
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("gz" | "gzip" | "bgz") => Self::Gzip,
            Some("zst" | "zstd") => Self::Zstd,
            _ => Self::None,
        }
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        !matches!(self, Self::None)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "plain",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }
}

/// How the writer chooses its output compression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionMode {
    /// Pick by output path suffix
    #[default]
    Auto,
    /// Never compress
    None,
    /// Always gzip
    Gzip,
    /// Always zstd
    Zstd,
}
impl CompressionMode {
    /// Resolves the mode to a concrete format for `path`
    #[must_use]
    pub fn resolve<P: AsRef<Path>>(self, path: P) -> Compression {
        match self {
            Self::Auto => Compression::from_path(path),
            Self::None => Compression::None,
            Self::Gzip => Compression::Gzip,
            Self::Zstd => Compression::Zstd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff() {
        assert_eq!(Compression::sniff(&[0x1F, 0x8B, 0x08]), Compression::Gzip);
        assert_eq!(Compression::sniff(&ZSTD_MAGIC), Compression::Zstd);
        assert_eq!(Compression::sniff(b"@r1\n"), Compression::None);
        assert_eq!(Compression::sniff(&[0x1F]), Compression::None);
        assert_eq!(Compression::sniff(&[]), Compression::None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Compression::from_path("reads.fastq.gz"), Compression::Gzip);
        assert_eq!(Compression::from_path("reads.FQ.GZ"), Compression::Gzip);
        assert_eq!(Compression::from_path("reads.fq.zst"), Compression::Zstd);
        assert_eq!(Compression::from_path("reads.fastq"), Compression::None);
        assert_eq!(Compression::from_path("reads"), Compression::None);
    }

    #[test]
    fn test_mode_resolution() {
        assert_eq!(
            CompressionMode::Auto.resolve("out.fq.gz"),
            Compression::Gzip
        );
        assert_eq!(
            CompressionMode::Gzip.resolve("out.fq"),
            Compression::Gzip
        );
        assert_eq!(
            CompressionMode::None.resolve("out.fq.gz"),
            Compression::None
        );
    }
}
