use std::fmt;

use pki_types::{DfspId, EnrollmentDirection, EnrollmentId};

/// Location of a secret inside the key/value mount
///
/// Paths are only ever built from typed identifiers, never from caller strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKey {
    /// Folder holding every enrollment of one DFSP in one direction
    Enrollments(EnrollmentDirection, DfspId),
    Enrollment(EnrollmentDirection, DfspId, EnrollmentId),
    DfspCa(DfspId),
    DfspJwsCert(DfspId),
    /// Folder holding the JWS certificate of every DFSP
    DfspJwsCerts,
    DfspExternalJwsCert(DfspId),
    DfspServerCert(DfspId),
    HubServerCert,
    HubCaDetails,
    HubEndpoints,
}

impl SecretKey {
    /// Every secret a DFSP can own, except its enrollments
    #[must_use]
    pub const fn dfsp_records(dfsp_id: DfspId) -> [Self; 4] {
        [
            Self::DfspCa(dfsp_id),
            Self::DfspJwsCert(dfsp_id),
            Self::DfspExternalJwsCert(dfsp_id),
            Self::DfspServerCert(dfsp_id),
        ]
    }
}

const fn enrollment_folder(direction: EnrollmentDirection) -> &'static str {
    match direction {
        EnrollmentDirection::Inbound => "dfsp-inbound-enrollment",
        EnrollmentDirection::Outbound => "dfsp-outbound-enrollment",
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enrollments(direction, dfsp_id) => {
                write!(f, "{}/{dfsp_id}", enrollment_folder(*direction))
            }
            Self::Enrollment(direction, dfsp_id, en_id) => {
                write!(f, "{}/{dfsp_id}/{en_id}", enrollment_folder(*direction))
            }
            Self::DfspCa(dfsp_id) => write!(f, "dfsp-ca/{dfsp_id}"),
            Self::DfspJwsCert(dfsp_id) => write!(f, "dfsp-jws-certs/{dfsp_id}"),
            Self::DfspJwsCerts => f.write_str("dfsp-jws-certs"),
            Self::DfspExternalJwsCert(dfsp_id) => write!(f, "dfsp-external-jws-certs/{dfsp_id}"),
            Self::DfspServerCert(dfsp_id) => write!(f, "dfsp-server-cert/{dfsp_id}"),
            Self::HubServerCert => f.write_str("hub-server-cert"),
            Self::HubCaDetails => f.write_str("hub-ca-details"),
            Self::HubEndpoints => f.write_str("hub-endpoints"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_secret_paths() {
        let dfsp = DfspId::new(7);
        let en = EnrollmentId::new(3);
        let cases = vec![
            (
                SecretKey::Enrollment(EnrollmentDirection::Outbound, dfsp, en),
                "dfsp-outbound-enrollment/7/3",
            ),
            (
                SecretKey::Enrollments(EnrollmentDirection::Inbound, dfsp),
                "dfsp-inbound-enrollment/7",
            ),
            (SecretKey::DfspCa(dfsp), "dfsp-ca/7"),
            (SecretKey::DfspJwsCert(dfsp), "dfsp-jws-certs/7"),
            (SecretKey::DfspExternalJwsCert(dfsp), "dfsp-external-jws-certs/7"),
            (SecretKey::DfspServerCert(dfsp), "dfsp-server-cert/7"),
            (SecretKey::HubServerCert, "hub-server-cert"),
            (SecretKey::HubCaDetails, "hub-ca-details"),
            (SecretKey::HubEndpoints, "hub-endpoints"),
        ];

        for (key, expected) in cases {
            assert_eq!(key.to_string(), expected, "case: {key:?}");
        }
    }
}
