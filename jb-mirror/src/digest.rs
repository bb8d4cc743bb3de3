use crate::error::MirrorError;
use sha2::Digest as _;
use std::path::Path;

/// Check a file's contents against a detached checksum file.
///
/// The digest file's first whitespace-delimited token is the expected
/// hex digest, and its extension names the algorithm (`.sha256`).
/// Returns `Ok(false)` only for a genuine mismatch; I/O failures on
/// either file are errors, never `false`.
pub fn verify(target_file: &Path, digest_file: &Path) -> Result<bool, MirrorError> {
    tracing::debug!(
        "Checking {} against {}",
        target_file.display(),
        digest_file.display()
    );

    let expected = read_expected_digest(digest_file)?;

    let algorithm = digest_file
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let computed = match algorithm.as_str() {
        "sha256" => compute_digest::<sha2::Sha256>(target_file)?,
        other => return Err(MirrorError::UnsupportedHashAlgorithm(other.to_owned())),
    };

    Ok(computed.eq_ignore_ascii_case(&expected))
}

fn read_expected_digest(digest_file: &Path) -> Result<String, MirrorError> {
    let contents = std::fs::read_to_string(digest_file).map_err(|source| MirrorError::DigestRead {
        file: digest_file.to_path_buf(),
        source,
    })?;

    contents
        .split_whitespace()
        .next()
        .map(str::to_lowercase)
        .ok_or_else(|| MirrorError::DigestRead {
            file: digest_file.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "digest file is empty"),
        })
}

fn compute_digest<D: sha2::Digest + std::io::Write>(target_file: &Path) -> Result<String, MirrorError> {
    let wrap = |source| MirrorError::DigestCompute {
        file: target_file.to_path_buf(),
        source,
    };

    let mut file = std::fs::File::open(target_file).map_err(wrap)?;
    let mut hasher = D::new();
    std::io::copy(&mut file, &mut hasher).map_err(wrap)?;

    Ok(hex_string(hasher.finalize().as_slice()))
}

/// Render bytes as lowercase hex.
pub(crate) fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, byte| {
            let (high, low) = byte_to_hex(*byte);

            acc.push(high);
            acc.push(low);
            acc
        })
}

fn byte_to_hex(byte: u8) -> (char, char) {
    (
        std::char::from_digit((byte >> 4) as u32, 16).unwrap(),
        std::char::from_digit((byte & 0xF) as u32, 16).unwrap(),
    )
}
