/// Errors raised by launch validation and by the executor.
///
/// Kernel bodies never produce these directly: buffer sizes, dimension
/// preconditions and geometry are checked before a launch starts, and a fault
/// inside a running kernel is surfaced as [`SimtError::DeviceFault`].
#[derive(Debug, thiserror::Error)]
pub enum SimtError {
    #[error("kernel '{kernel}' launched over an empty range")]
    EmptyLaunch { kernel: &'static str },

    #[error("buffer '{name}' holds {len} elements, at least {needed} required")]
    BufferTooSmall {
        name: &'static str,
        len: usize,
        needed: usize,
    },

    #[error("length mismatch: '{left}' has {left_len} elements, '{right}' has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("dimension {dim} = {value} is not a non-zero multiple of tile size {tile}")]
    NotTileAligned {
        dim: &'static str,
        value: usize,
        tile: usize,
    },

    #[error("invalid launch configuration for '{kernel}': {reason}")]
    InvalidLaunch { kernel: &'static str, reason: String },

    #[error("device fault in kernel '{kernel}': {message}")]
    DeviceFault { kernel: &'static str, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let e = SimtError::NotTileAligned { dim: "K", value: 20, tile: 16 };
        assert_eq!(
            e.to_string(),
            "dimension K = 20 is not a non-zero multiple of tile size 16"
        );

        let e = SimtError::BufferTooSmall { name: "c", len: 3, needed: 4 };
        assert_eq!(e.to_string(), "buffer 'c' holds 3 elements, at least 4 required");
    }
}
