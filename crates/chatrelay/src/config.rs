//! Relay-wide configuration.

use chatrelay_protocol::{DEFAULT_DELIMITER, DelimitedCodec};
use chatrelay_session::SessionConfig;

/// Settings for a relay server.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Field separator for inbound and outbound lines.
    ///
    /// Default: `'|'`.
    pub delimiter: char,

    /// Whether a disconnecting client also loses its room memberships.
    /// When `false` only its presence and handler binding are cleared, so
    /// it is back in its rooms as soon as it reconnects.
    ///
    /// Default: `true`.
    pub prune_membership_on_close: bool,

    /// Timeouts and limits applied to each connection.
    pub session: SessionConfig,
}

impl RelayConfig {
    /// The line codec these settings describe.
    pub fn codec(&self) -> DelimitedCodec {
        DelimitedCodec::new(self.delimiter)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            prune_membership_on_close: true,
            session: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.delimiter, '|');
        assert!(cfg.prune_membership_on_close);
        assert_eq!(cfg.codec().delimiter(), '|');
    }

    #[test]
    fn test_codec_follows_delimiter() {
        let cfg = RelayConfig {
            delimiter: '/',
            ..RelayConfig::default()
        };
        assert_eq!(cfg.codec().delimiter(), '/');
    }
}
