/// PEM labels accepted for certificate signing requests
pub const CSR_PEM_LABELS: [&str; 2] = ["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

/// PEM label of an X.509 certificate
pub const CERTIFICATE_PEM_LABEL: &str = "CERTIFICATE";

/// Start of every PEM block; concatenated chains are split on it
pub const PEM_BLOCK_START: &str = "-----BEGIN";

/// Signature algorithms accepted by the `*_SIGNATURE_ALGORITHM_SHA256_512` checks
pub const ALLOWED_SIGNATURE_ALGORITHMS: [&str; 2] =
    ["sha256WithRSAEncryption", "sha512WithRSAEncryption"];

/// Longest issuer path followed before giving up
pub const MAX_CHAIN_DEPTH: usize = 10;

/// Maps a signature algorithm OID to its conventional name. Unknown OIDs keep their dotted form.
#[must_use]
pub fn signature_algorithm_name(oid: &str) -> String {
    let name = match oid {
        "1.2.840.113549.1.1.4" => "md5WithRSAEncryption",
        "1.2.840.113549.1.1.5" => "sha1WithRSAEncryption",
        "1.2.840.113549.1.1.10" => "RSASSA-PSS",
        "1.2.840.113549.1.1.11" => "sha256WithRSAEncryption",
        "1.2.840.113549.1.1.12" => "sha384WithRSAEncryption",
        "1.2.840.113549.1.1.13" => "sha512WithRSAEncryption",
        "1.2.840.10045.4.3.2" => "ecdsa-with-SHA256",
        "1.2.840.10045.4.3.3" => "ecdsa-with-SHA384",
        "1.2.840.10045.4.3.4" => "ecdsa-with-SHA512",
        "1.3.101.112" => "Ed25519",
        other => other,
    };
    name.to_string()
}
