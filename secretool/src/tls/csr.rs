use rcgen::{
    CertificateParams, DistinguishedName, DnType, DnValue, KeyPair, SanType,
    string::{Ia5String, PrintableString},
};
use secretool_base::consts::certificate;
use snafu::{ResultExt, ensure};

use super::{Error, error};

/// Subject of the serving certificate of a service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertConfig {
    pub common_name: String,
    pub organization: Vec<String>,
    pub dns_names: Vec<String>,
}

/// PEM encoded certificate signing request with the private key it was
/// signed with.
#[derive(Clone, Debug)]
pub struct SigningRequestPem {
    pub request: String,
    pub private_key: String,
}

impl CertConfig {
    /// Names under which `service` in `namespace` is reachable from inside
    /// the cluster, plus the loopback address.
    pub fn for_service(service: &str, namespace: &str) -> Result<Self, Error> {
        ensure!(!service.is_empty(), error::EmptyServiceNameSnafu);

        let service_host = format!("{service}.{namespace}.svc");
        Ok(Self {
            common_name: service_host.clone(),
            organization: vec![service.to_string()],
            dns_names: vec![
                "127.0.0.1".to_string(),
                service.to_string(),
                format!("{service}.{namespace}"),
                service_host.clone(),
                format!("{service_host}.cluster"),
                format!("{service_host}.cluster.local"),
            ],
        })
    }

    fn subject_alt_names(&self) -> Result<Vec<SanType>, Error> {
        self.dns_names
            .iter()
            .map(|name| match name.parse::<std::net::IpAddr>() {
                Ok(ip) => Ok(SanType::IpAddress(ip)),
                Err(_) => Ia5String::try_from(name.as_str())
                    .map(SanType::DnsName)
                    .context(error::BuildRequestSnafu),
            })
            .collect()
    }

    /// Generates a 2048-bit RSA key and a signing request for this subject.
    pub fn generate(&self) -> Result<SigningRequestPem, Error> {
        let key_pair =
            KeyPair::generate_rsa_for(&rcgen::PKCS_RSA_SHA256, rcgen::RsaKeySize::_2048)
                .context(error::GenerateKeySnafu)?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, DnValue::Utf8String(self.common_name.clone()));
        for organization in &self.organization {
            dn.push(DnType::OrganizationName, DnValue::Utf8String(organization.clone()));
        }
        let country =
            PrintableString::try_from(certificate::COUNTRY).context(error::BuildRequestSnafu)?;
        dn.push(DnType::CountryName, DnValue::PrintableString(country));

        let mut params = CertificateParams::default();
        params.distinguished_name = dn;
        params.subject_alt_names = self.subject_alt_names()?;

        let request = params
            .serialize_request(&key_pair)
            .and_then(|request| request.pem())
            .context(error::BuildRequestSnafu)?;
        Ok(SigningRequestPem { request, private_key: key_pair.serialize_pem() })
    }
}
