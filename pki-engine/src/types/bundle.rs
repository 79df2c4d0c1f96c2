use serde::{Deserialize, Serialize};

/// Client certificate material pushed for the DFSP gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCertBundle {
    /// DFSP CA root and intermediates
    pub ca_bundle: String,
    pub client_key: String,
    /// Client certificate followed by the DFSP CA chain
    pub client_cert_chain: String,
    pub host: String,
    pub fqdn: String,
}

/// Address allowed through the gateway, with optional port restrictions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpWhitelistEntry {
    pub address: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

/// Which gateway a whitelist is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitelistScope {
    /// Addresses of the DFSP's own connector
    Internal,
    /// Addresses the DFSP calls the hub from
    External,
}

/// Joins PEM blocks, each terminated by a single newline
#[must_use]
pub fn join_pem<'a>(blocks: impl IntoIterator<Item = Option<&'a str>>) -> String {
    blocks
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .fold(String::new(), |mut joined, block| {
            joined.push_str(block);
            joined.push('\n');
            joined
        })
}

/// Whether `name` can be used as the last segment of a bundle path
#[must_use]
pub fn is_valid_bundle_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_join_pem_skips_missing_blocks() {
        let joined = join_pem([Some("A\n"), None, Some("  "), Some("B")]);
        assert_eq!(joined, "A\nB\n");
        assert_eq!(join_pem([None]), "");
    }

    #[test]
    fn test_bundle_names() {
        let cases = vec![
            ("plain", "dfsp1", true),
            ("dotted", "payer.fsp-01_a", true),
            ("empty", "", false),
            ("parent", "..", false),
            ("slash", "a/b", false),
            ("space", "a b", false),
        ];

        for (name, input, expected) in cases {
            assert_eq!(is_valid_bundle_name(input), expected, "case: {name}");
        }
    }
}
