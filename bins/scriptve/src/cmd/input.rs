use std::path::PathBuf;
use std::sync::Arc;

/// Shared by every subcommand that accepts a compiled script either inline
/// as a hex string or from a file (mirroring `revme`'s `evmrunner` command).
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("the specified path does not exist")]
    PathNotExists,
    #[error("invalid hex string")]
    InvalidHex,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn load_bytes(bytes: &Option<String>, path: &Option<PathBuf>) -> Result<Arc<[u8]>, InputError> {
    let raw = if let Some(path) = path {
        if !path.exists() {
            return Err(InputError::PathNotExists);
        }
        std::fs::read_to_string(path)?
    } else if let Some(bytes) = bytes {
        bytes.clone()
    } else {
        unreachable!("clap enforces bytes or path")
    };

    let trimmed = raw.trim().trim_start_matches("0x");
    hex::decode(trimmed).map(Into::into).map_err(|_| InputError::InvalidHex)
}
